//! Server descriptors: how to reach one MCP server.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::AuthProvider;

/// Wire transport for HTTP-reachable servers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Legacy HTTP+SSE: a GET event stream plus a POST endpoint.
    #[default]
    Sse,
    /// Single-endpoint streamable HTTP.
    #[strum(to_string = "streamable_http", serialize = "streamable-http")]
    #[serde(alias = "streamable-http")]
    StreamableHttp,
}

/// A locally spawned server speaking over stdin/stdout.
///
/// ```
/// use mcp_bridge::mcp::StdioServer;
///
/// let server = StdioServer::builder()
///     .command("uvx")
///     .args(vec!["mcp-server-time".into()])
///     .build();
/// assert_eq!(server.command, "uvx");
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct StdioServer {
    #[builder(into)]
    pub name: Option<String>,
    #[builder(into)]
    pub command: String,
    #[builder(default)]
    pub args: Vec<String>,
    #[builder(default)]
    pub env: BTreeMap<String, String>,
    #[builder(into)]
    pub cwd: Option<PathBuf>,
}

/// A remote server reached over HTTP.
#[derive(Clone, Builder)]
pub struct HttpServer {
    #[builder(into)]
    pub name: Option<String>,
    #[builder(into)]
    pub url: String,
    #[builder(default)]
    pub transport: TransportKind,
    #[builder(default)]
    pub headers: BTreeMap<String, String>,
    pub auth: Option<Arc<dyn AuthProvider>>,
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("transport", &self.transport)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("auth", &self.auth)
            .finish()
    }
}

/// Everything needed to open one server connection.
#[derive(Debug, Clone)]
pub enum ServerDescriptor {
    Stdio(StdioServer),
    Http(HttpServer),
}

impl ServerDescriptor {
    /// Shorthand for a stdio server with arguments.
    pub fn stdio<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ServerDescriptor::Stdio(
            StdioServer::builder()
                .command(command)
                .args(args.into_iter().map(Into::into).collect())
                .build(),
        )
    }

    /// Shorthand for an HTTP server without headers or auth.
    pub fn http(url: impl Into<String>, transport: TransportKind) -> Self {
        ServerDescriptor::Http(HttpServer::builder().url(url).transport(transport).build())
    }

    /// Human-readable label used in logs and errors.
    pub fn label(&self) -> String {
        match self {
            ServerDescriptor::Stdio(server) => server.name.clone().unwrap_or_else(|| {
                std::iter::once(server.command.as_str())
                    .chain(server.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            ServerDescriptor::Http(server) => {
                server.name.clone().unwrap_or_else(|| server.url.clone())
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ServerDescriptor::Stdio(server) => server.name.as_deref(),
            ServerDescriptor::Http(server) => server.name.as_deref(),
        }
    }
}

impl From<StdioServer> for ServerDescriptor {
    fn from(server: StdioServer) -> Self {
        ServerDescriptor::Stdio(server)
    }
}

impl From<HttpServer> for ServerDescriptor {
    fn from(server: HttpServer) -> Self {
        ServerDescriptor::Http(server)
    }
}
