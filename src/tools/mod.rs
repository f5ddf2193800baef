//! Agent tool shape produced by the agent adapter.

pub mod arguments;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use tool::{AgentTool, Tool, ToolExecutionContext, ToolHandler};
pub use types::AgentToolParameters;
