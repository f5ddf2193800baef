//! Convenience re-exports for common use.

pub use crate::adapter::{
    AgentToolAdapter, CodeAgentAdapter, OutputPolicy, PassthroughAdapter, ResultWrapping,
    ToolAdapter, ToolOutput, TypedToolAdapter,
};
pub use crate::auth::{ApiKeyAuthProvider, AuthProvider, BearerAuthProvider, HeaderFnProvider};
pub use crate::config::BridgeConfig;
pub use crate::error::{BridgeError, Result};
pub use crate::mcp::{
    AggregateOptions, HttpServer, McpToolset, ServerDescriptor, SessionBridge, StdioServer,
    TransportKind,
};
pub use crate::tools::{AgentTool, Tool, ToolArguments, ToolExecutionContext};
