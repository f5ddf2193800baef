//! TOML server files.
//!
//! ```toml
//! [bridge]
//! handshake_timeout_ms = 5000
//!
//! [[servers]]
//! name = "time"
//! command = "uvx"
//! args = ["mcp-server-time"]
//!
//! [[servers]]
//! name = "search"
//! url = "https://search.example/mcp"
//! transport = "streamable_http"
//! bearer_token = "${SEARCH_TOKEN}"
//! ```
//!
//! `${VAR}` placeholders in arguments, environment values, headers and
//! credentials are expanded from the process environment at load time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use super::BridgeConfig;
use crate::auth::{ApiKeyAuthProvider, AuthProvider, BearerAuthProvider};
use crate::error::BridgeError;
use crate::mcp::descriptor::{HttpServer, ServerDescriptor, StdioServer, TransportKind};

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Default location: `<platform config dir>/mcp-bridge/servers.toml`.
pub fn default_servers_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mcp-bridge")
        .map(|dirs| dirs.config_dir().join("servers.toml"))
}

/// Parsed contents of a servers file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServersFile {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

/// Optional timeout overrides, in milliseconds. `0` disables a timeout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    pub handshake_timeout_ms: Option<u64>,
    pub close_timeout_ms: Option<u64>,
    pub call_timeout_ms: Option<u64>,
}

/// One `[[servers]]` table. Exactly one of `command` or `url` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerEntry {
    pub name: Option<String>,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub url: Option<String>,
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: Option<String>,
}

impl ServersFile {
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            BridgeError::Configuration(message) => {
                BridgeError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        toml::from_str(text).map_err(|e| BridgeError::Configuration(e.to_string()))
    }

    /// Apply the `[bridge]` overrides on top of `base`.
    pub fn bridge_config(&self, base: BridgeConfig) -> BridgeConfig {
        let mut config = base;
        if let Some(ms) = self.bridge.handshake_timeout_ms {
            config.handshake_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = self.bridge.close_timeout_ms {
            config.close_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.bridge.call_timeout_ms {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config
    }

    /// Build descriptors in file order, expanding `${VAR}` from the environment.
    pub fn descriptors(&self) -> Result<Vec<ServerDescriptor>, BridgeError> {
        self.descriptors_with(|key| std::env::var(key).ok())
    }

    fn descriptors_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Vec<ServerDescriptor>, BridgeError> {
        let expander = EnvExpander::new(&lookup)?;
        self.servers
            .iter()
            .enumerate()
            .map(|(idx, entry)| entry.to_descriptor(&expander, idx))
            .collect()
    }
}

impl ServerEntry {
    fn to_descriptor(&self, env: &EnvExpander<'_>, idx: usize) -> Result<ServerDescriptor, BridgeError> {
        let label = self
            .name
            .clone()
            .unwrap_or_else(|| format!("servers[{idx}]"));
        match (&self.command, &self.url) {
            (Some(command), None) => Ok(ServerDescriptor::Stdio(StdioServer {
                name: self.name.clone(),
                command: env.expand(command)?,
                args: self
                    .args
                    .iter()
                    .map(|arg| env.expand(arg))
                    .collect::<Result<_, _>>()?,
                env: expand_map(env, &self.env)?,
                cwd: self.cwd.clone(),
            })),
            (None, Some(url)) => Ok(ServerDescriptor::Http(HttpServer {
                name: self.name.clone(),
                url: env.expand(url)?,
                transport: self.transport.unwrap_or_default(),
                headers: expand_map(env, &self.headers)?,
                auth: self.auth_provider(env, &label)?,
            })),
            (Some(_), Some(_)) => Err(BridgeError::Configuration(format!(
                "{label}: set either 'command' or 'url', not both"
            ))),
            (None, None) => Err(BridgeError::Configuration(format!(
                "{label}: one of 'command' or 'url' is required"
            ))),
        }
    }

    fn auth_provider(
        &self,
        env: &EnvExpander<'_>,
        label: &str,
    ) -> Result<Option<Arc<dyn AuthProvider>>, BridgeError> {
        match (&self.bearer_token, &self.api_key) {
            (Some(_), Some(_)) => Err(BridgeError::Configuration(format!(
                "{label}: 'bearer_token' and 'api_key' are mutually exclusive"
            ))),
            (Some(token), None) => Ok(Some(
                Arc::new(BearerAuthProvider::new(env.expand(token)?)) as Arc<dyn AuthProvider>
            )),
            (None, Some(key)) => {
                let header = self
                    .api_key_header
                    .as_deref()
                    .unwrap_or(DEFAULT_API_KEY_HEADER);
                Ok(Some(
                    Arc::new(ApiKeyAuthProvider::new(header, env.expand(key)?)) as Arc<dyn AuthProvider>
                ))
            }
            (None, None) => Ok(None),
        }
    }
}

fn expand_map(
    env: &EnvExpander<'_>,
    map: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, BridgeError> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), env.expand(value)?)))
        .collect()
}

struct EnvExpander<'a> {
    pattern: Regex,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvExpander<'a> {
    fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| BridgeError::Configuration(format!("invalid placeholder pattern: {e}")))?;
        Ok(Self { pattern, lookup })
    }

    fn expand(&self, value: &str) -> Result<String, BridgeError> {
        let mut out = String::with_capacity(value.len());
        let mut last = 0;
        for captures in self.pattern.captures_iter(value) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let resolved = (self.lookup)(name.as_str()).ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "environment variable '{}' is not set",
                    name.as_str()
                ))
            })?;
            out.push_str(&value[last..whole.start()]);
            out.push_str(&resolved);
            last = whole.end();
        }
        out.push_str(&value[last..]);
        Ok(out)
    }
}
