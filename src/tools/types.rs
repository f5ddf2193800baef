//! Tool parameter schemas.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::mcp::RemoteTool;
use crate::schema::normalize_input_schema;

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolParameters {
    /// JSON Schema object describing the parameters.
    pub schema: serde_json::Value,
}

impl AgentToolParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// Create an empty parameter schema (no parameters).
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Parameters of a remote tool, with references resolved and every
    /// property given a type and description.
    pub fn from_remote(tool: &RemoteTool) -> Result<Self, BridgeError> {
        normalize_input_schema(&tool.input_schema).map(Self::from_schema)
    }
}
