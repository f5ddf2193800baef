//! MCP transport layer: turn a [`ServerDescriptor`] into a running rmcp session.

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService};

use super::descriptor::{ServerDescriptor, TransportKind};
use crate::error::BridgeError;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// Opens a fresh channel and runs the initialize handshake over it.
///
/// `connect` may be called more than once (protocol fallback); every call
/// opens a new channel.
#[async_trait]
pub trait McpTransport: Send {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError>;
}

mod sse;
mod stdio;
mod streamable_http;

pub use sse::SseTransport;
pub use stdio::StdioTransport;
pub use streamable_http::StreamableHttpTransport;

/// Build the transport matching a descriptor.
///
/// Auth headers for HTTP transports are resolved here, so call this at
/// connection time.
pub fn open_transport(descriptor: &ServerDescriptor) -> Result<Box<dyn McpTransport>, BridgeError> {
    Ok(match descriptor {
        ServerDescriptor::Stdio(server) => Box::new(StdioTransport::from_server(server)),
        ServerDescriptor::Http(server) => match server.transport {
            TransportKind::StreamableHttp => Box::new(StreamableHttpTransport::from_server(server)?),
            TransportKind::Sse => Box::new(SseTransport::from_server(server)),
        },
    })
}
