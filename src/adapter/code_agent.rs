//! Adapter for code-executing agents: typed input map, declared output type,
//! media-capable results.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::output::{MediaSupport, OutputPolicy, OutputReconciler, ToolOutput};
use super::sanitize::{sanitize_function_name, HostLanguage};
use super::{ToolAdapter, ToolCaller};
use crate::error::BridgeError;
use crate::mcp::RemoteTool;
use crate::schema::translate;

/// Declared type and documentation of one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// The input may be omitted or `null`.
    pub nullable: bool,
}

/// Remote tool exposed to a code agent.
#[derive(Clone)]
pub struct CodeAgentTool {
    pub name: String,
    pub description: String,
    pub inputs: BTreeMap<String, InputSpec>,
    /// `"string"` or `"object"`.
    pub output_type: &'static str,
    pub output_schema: Option<Value>,
    call: ToolCaller,
    reconciler: OutputReconciler,
}

impl CodeAgentTool {
    /// Invoke the remote tool and reconcile its result.
    pub fn forward(&self, arguments: Value) -> Result<ToolOutput, BridgeError> {
        let result = (self.call)(arguments)?;
        self.reconciler.reconcile(result)
    }
}

impl std::fmt::Debug for CodeAgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeAgentTool")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output_type", &self.output_type)
            .finish()
    }
}

/// Builds [`CodeAgentTool`]s. Names follow Python identifier rules since the
/// tools are called from generated Python code.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeAgentAdapter {
    policy: OutputPolicy,
}

impl CodeAgentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structured(mut self, enabled: bool) -> Self {
        self.policy.structured_output = enabled;
        self
    }

    pub fn with_output_policy(mut self, policy: OutputPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl ToolAdapter for CodeAgentAdapter {
    type Tool = CodeAgentTool;

    fn framework(&self) -> &'static str {
        "code-agent"
    }

    fn adapt(&self, call: ToolCaller, tool: &RemoteTool) -> Result<CodeAgentTool, BridgeError> {
        let model = translate(&tool.input_schema)?;
        let inputs = model
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    InputSpec {
                        kind: field.ty.json_type().to_string(),
                        description: field.description.clone(),
                        nullable: field.nullable || !field.required,
                    },
                )
            })
            .collect();
        let reconciler = OutputReconciler::new(tool, self.policy, MediaSupport::ALL);

        Ok(CodeAgentTool {
            name: sanitize_function_name(&tool.name, HostLanguage::Python),
            description: tool.description_or_empty().to_string(),
            inputs,
            output_type: reconciler.mode().native_type(),
            output_schema: tool.output_schema.clone(),
            call,
            reconciler,
        })
    }
}
