//! Model Context Protocol (MCP) sessions, lifecycle bridge and aggregation.

pub mod aggregate;
pub mod bridge;
pub mod client;
pub mod descriptor;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{AggregateOptions, ConnectionOutcome, FailedConnection, McpToolset};
pub use bridge::{AsyncToolCaller, BridgeState, SessionBridge, ToolCaller};
pub use client::McpClient;
pub use descriptor::{HttpServer, ServerDescriptor, StdioServer, TransportKind};
pub use session::{Connector, SessionOps, TransportConnector};
pub use types::{ContentItem, EmbeddedResource, RemoteTool, ToolResult};
