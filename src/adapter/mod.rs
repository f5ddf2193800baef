//! Tool adapters: wrap remote MCP tools as framework-native tool objects.
//!
//! Every adapter receives a forwarding function bound to one remote tool on
//! one session and produces its own tool shape. All of them share the
//! output reconciliation in [`output`].

pub mod agent;
pub mod code_agent;
pub mod output;
pub mod passthrough;
pub mod sanitize;
pub mod typed;

pub use agent::AgentToolAdapter;
pub use code_agent::{CodeAgentAdapter, CodeAgentTool, InputSpec};
pub use output::{MediaSupport, OutputMode, OutputPolicy, OutputReconciler, ResultWrapping, ToolOutput};
pub use passthrough::{PassthroughAdapter, PassthroughTool};
pub use sanitize::{sanitize_function_name, HostLanguage};
pub use typed::{TypedTool, TypedToolAdapter};

pub use crate::mcp::bridge::{AsyncToolCaller, ToolCaller};

use crate::error::BridgeError;
use crate::mcp::RemoteTool;

/// Builds one framework's tool shape from a remote tool.
pub trait ToolAdapter: Send + Sync {
    type Tool: Send;

    /// Short name of the target framework, used in errors.
    fn framework(&self) -> &'static str;

    fn adapt(&self, call: ToolCaller, tool: &RemoteTool) -> Result<Self::Tool, BridgeError>;

    /// Adapt for an async session. Unsupported unless overridden.
    fn adapt_async(
        &self,
        call: AsyncToolCaller,
        tool: &RemoteTool,
    ) -> Result<Self::Tool, BridgeError> {
        let _ = call;
        Err(BridgeError::NotSupported(format!(
            "{} tools cannot wrap async sessions (tool '{}')",
            self.framework(),
            tool.name
        )))
    }
}
