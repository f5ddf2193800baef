//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::BridgeError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Arguments as sent over the wire: always a JSON object.
    ///
    /// A JSON-encoded string is decoded first; `null` and empty strings
    /// become `{}`.
    pub fn to_object(&self) -> Result<Value, BridgeError> {
        let value = match &self.value {
            Value::Null => return Ok(Value::Object(Default::default())),
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Value::Object(Default::default()));
                }
                serde_json::from_str::<Value>(trimmed).map_err(|e| {
                    BridgeError::InvalidArgument(format!("Failed to parse arguments: {e}"))
                })?
            }
            other => other.clone(),
        };
        if value.is_object() {
            Ok(value)
        } else {
            Err(BridgeError::InvalidArgument(format!(
                "Tool arguments must be a JSON object, got {value}"
            )))
        }
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, BridgeError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, BridgeError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BridgeError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, BridgeError> {
        serde_json::from_value(self.to_object()?).map_err(|e| {
            BridgeError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
