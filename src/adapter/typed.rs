//! Adapter producing strictly-typed, text-only tools.

use serde_json::Value;

use super::output::{MediaSupport, OutputPolicy, OutputReconciler, ToolOutput};
use super::sanitize::{sanitize_function_name, HostLanguage};
use super::{ToolAdapter, ToolCaller};
use crate::error::BridgeError;
use crate::mcp::RemoteTool;
use crate::schema::{translate, ObjectModel};
use crate::tools::ToolArguments;

/// Tool whose arguments are checked against a translated [`ObjectModel`]
/// before the call leaves the process. Always returns text.
#[derive(Clone)]
pub struct TypedTool {
    pub name: String,
    pub description: String,
    pub args_model: ObjectModel,
    call: ToolCaller,
    reconciler: OutputReconciler,
}

impl TypedTool {
    pub fn run(&self, arguments: Value) -> Result<String, BridgeError> {
        let arguments = ToolArguments::new(arguments).to_object()?;
        self.args_model.validate(&arguments)?;
        match self.reconciler.reconcile((self.call)(arguments)?)? {
            ToolOutput::Text(text) => Ok(text),
            other => Err(BridgeError::InvalidContent {
                tool_name: self.name.clone(),
                message: format!("expected text output, got {other:?}"),
            }),
        }
    }
}

impl std::fmt::Debug for TypedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedTool")
            .field("name", &self.name)
            .field("args_model", &self.args_model)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypedToolAdapter {
    host: HostLanguage,
}

impl TypedToolAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host_language(mut self, host: HostLanguage) -> Self {
        self.host = host;
        self
    }
}

impl ToolAdapter for TypedToolAdapter {
    type Tool = TypedTool;

    fn framework(&self) -> &'static str {
        "typed"
    }

    fn adapt(&self, call: ToolCaller, tool: &RemoteTool) -> Result<TypedTool, BridgeError> {
        let mut args_model = translate(&tool.input_schema)?;
        if args_model.title.is_none() {
            args_model.title = Some(format!("{}Arguments", tool.name));
        }
        Ok(TypedTool {
            name: sanitize_function_name(&tool.name, self.host),
            description: tool.description_or_empty().to_string(),
            args_model,
            call,
            reconciler: OutputReconciler::new(tool, OutputPolicy::raw_text(), MediaSupport::NONE),
        })
    }
}
