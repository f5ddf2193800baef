//! Session seam: what the bridge needs from an open MCP connection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::client::McpClient;
use super::descriptor::ServerDescriptor;
use super::transport::open_transport;
use super::types::{RemoteTool, ToolResult};
use crate::error::BridgeError;

/// Operations on one negotiated session.
///
/// Calls take `&self` so several may be in flight at once.
#[async_trait]
pub trait SessionOps: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BridgeError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, BridgeError>;

    /// Release the underlying channel. Must be safe to call more than once.
    async fn close(&self) -> Result<(), BridgeError>;
}

/// Opens sessions for server descriptors.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, descriptor: &ServerDescriptor) -> Result<Arc<dyn SessionOps>, BridgeError>;
}

/// Default connector: picks the transport from the descriptor and runs the
/// rmcp initialize handshake over it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportConnector;

#[async_trait]
impl Connector for TransportConnector {
    async fn connect(&self, descriptor: &ServerDescriptor) -> Result<Arc<dyn SessionOps>, BridgeError> {
        let label = descriptor.label();
        debug!(server = %label, "opening mcp transport");
        let mut transport = open_transport(descriptor).map_err(|e| e.into_connection(&label))?;
        let client = McpClient::connect(transport.as_mut())
            .await
            .map_err(|e| e.into_connection(&label))?;
        Ok(Arc::new(client))
    }
}
