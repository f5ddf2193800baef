//! Validate tool call arguments against a translated object model.

use serde_json::Value;

use super::ObjectModel;
use crate::error::BridgeError;

impl ObjectModel {
    /// Check `args` against this model before forwarding a call.
    ///
    /// Performs top-level validation: object shape, required field presence,
    /// and per-field type checks (unions and nullability included). Unknown
    /// fields are passed through untouched.
    pub fn validate(&self, args: &Value) -> Result<(), BridgeError> {
        let obj = args.as_object().ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            ))
        })?;

        for field in self.required_fields() {
            if !obj.contains_key(&field.name) {
                return Err(BridgeError::InvalidArgument(format!(
                    "missing required field '{}'",
                    field.name
                )));
            }
        }

        for (key, value) in obj {
            let Some(field) = self.field(key) else {
                continue;
            };
            if value.is_null() && field.nullable {
                continue;
            }
            if !field.ty.matches(value) {
                return Err(BridgeError::InvalidArgument(format!(
                    "field '{}' expected type '{}', got {}",
                    key,
                    field.ty,
                    json_type_name(value)
                )));
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
