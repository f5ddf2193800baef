//! JSON Schema to native type translation.
//!
//! Tool input schemas arrive as loosely-shaped JSON. [`translate`] turns one
//! into an [`ObjectModel`]: a flat list of typed fields with internal
//! references inlined, type lists folded into canonical unions, and missing
//! descriptions or types filled with defaults.

mod refs;
mod validation;

pub use refs::resolve_refs;

use std::fmt;

use serde_json::{Map, Value};

use crate::error::BridgeError;

/// Description used for parameters that do not document themselves.
pub const DEFAULT_PARAMETER_DESCRIPTION: &str = "see tool description";

/// Native type of a single field.
///
/// Variant order doubles as the canonical ordering of union members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeType {
    Text,
    Int,
    Float,
    Bool,
    Mapping,
    Sequence(Box<NativeType>),
    Null,
    Any,
    Union(Vec<NativeType>),
}

impl NativeType {
    /// Build a union in canonical form: flattened, sorted, deduplicated.
    /// A single remaining member is returned as itself.
    pub fn union(members: impl IntoIterator<Item = NativeType>) -> NativeType {
        let mut flat = Vec::new();
        for member in members {
            match member {
                NativeType::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => NativeType::Any,
            1 => flat.remove(0),
            _ => NativeType::Union(flat),
        }
    }

    /// JSON Schema type name of this type (`"any"` for unions).
    pub fn json_type(&self) -> &'static str {
        match self {
            NativeType::Text => "string",
            NativeType::Int => "integer",
            NativeType::Float => "number",
            NativeType::Bool => "boolean",
            NativeType::Mapping => "object",
            NativeType::Sequence(_) => "array",
            NativeType::Null => "null",
            NativeType::Any | NativeType::Union(_) => "any",
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            NativeType::Text => value.is_string(),
            NativeType::Int => value.is_i64() || value.is_u64(),
            NativeType::Float => value.is_number(),
            NativeType::Bool => value.is_boolean(),
            NativeType::Mapping => value.is_object(),
            NativeType::Sequence(item) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| item.matches(v))),
            NativeType::Null => value.is_null(),
            NativeType::Any => true,
            NativeType::Union(members) => members.iter().any(|m| m.matches(value)),
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Sequence(item) => write!(f, "array[{item}]"),
            NativeType::Union(members) => {
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            other => f.write_str(other.json_type()),
        }
    }
}

/// One translated property of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: NativeType,
    pub description: String,
    pub required: bool,
    /// `null` is an accepted value.
    pub nullable: bool,
    pub default: Option<Value>,
}

/// Native descriptor of an object schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectModel {
    pub title: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl ObjectModel {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// Translate an object schema into an [`ObjectModel`].
pub fn translate(schema: &Value) -> Result<ObjectModel, BridgeError> {
    let resolved = resolve_refs(schema)?;
    let root = resolved
        .as_object()
        .ok_or_else(|| BridgeError::Schema(format!("schema must be a JSON object, got {resolved}")))?;

    if let Some(kind) = root.get("type") {
        if kind.as_str() != Some("object") {
            return Err(BridgeError::Schema(format!(
                "tool input schema must have type 'object', got {kind}"
            )));
        }
    }

    let required = required_names(root)?;
    let properties = match root.get("properties") {
        Some(Value::Object(properties)) => Some(properties),
        Some(other) => {
            return Err(BridgeError::Schema(format!(
                "'properties' must be an object, got {other}"
            )))
        }
        None => None,
    };

    let Some(properties) = properties else {
        if !required.is_empty() {
            return Err(BridgeError::Schema(format!(
                "schema requires {} but declares no properties",
                required.join(", ")
            )));
        }
        return Ok(ObjectModel {
            title: title_of(root),
            fields: Vec::new(),
        });
    };

    if let Some(missing) = required.iter().find(|name| !properties.contains_key(*name)) {
        return Err(BridgeError::Schema(format!(
            "required property '{missing}' is not declared"
        )));
    }

    let mut fields = Vec::with_capacity(properties.len());
    for (name, property) in properties {
        let property = property.as_object().ok_or_else(|| {
            BridgeError::Schema(format!("property '{name}' must be a schema object"))
        })?;
        let (ty, nullable) = property_type(name, property)?;
        fields.push(FieldSpec {
            name: name.clone(),
            ty,
            description: property
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PARAMETER_DESCRIPTION)
                .to_string(),
            required: required.iter().any(|r| r == name),
            nullable,
            default: property.get("default").cloned(),
        });
    }

    Ok(ObjectModel {
        title: title_of(root),
        fields,
    })
}

/// Resolve references and fill in missing parameter descriptions and types,
/// keeping the result a JSON Schema document.
pub fn normalize_input_schema(schema: &Value) -> Result<Value, BridgeError> {
    let mut resolved = resolve_refs(schema)?;
    let root = resolved
        .as_object_mut()
        .ok_or_else(|| BridgeError::Schema("schema must be a JSON object".into()))?;
    root.entry("type").or_insert_with(|| Value::String("object".into()));
    let properties = root
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));

    if let Value::Object(properties) = properties {
        for property in properties.values_mut() {
            let Value::Object(property) = property else {
                continue;
            };
            property
                .entry("description")
                .or_insert_with(|| Value::String(DEFAULT_PARAMETER_DESCRIPTION.into()));
            let composite = ["anyOf", "oneOf", "allOf", "enum", "const"]
                .iter()
                .any(|key| property.contains_key(*key));
            if !composite {
                property
                    .entry("type")
                    .or_insert_with(|| Value::String("string".into()));
            }
        }
    }
    Ok(resolved)
}

fn title_of(root: &Map<String, Value>) -> Option<String> {
    root.get("title").and_then(Value::as_str).map(str::to_string)
}

fn required_names(root: &Map<String, Value>) -> Result<Vec<String>, BridgeError> {
    match root.get("required") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    BridgeError::Schema(format!("required entries must be strings, got {item}"))
                })
            })
            .collect(),
        Some(other) => Err(BridgeError::Schema(format!(
            "'required' must be an array, got {other}"
        ))),
    }
}

/// Returns the field type plus whether `null` is accepted.
fn property_type(
    name: &str,
    property: &Map<String, Value>,
) -> Result<(NativeType, bool), BridgeError> {
    if let Some(kind) = property.get("type") {
        let names: Vec<&str> = match kind {
            Value::String(single) => vec![single.as_str()],
            Value::Array(list) => list
                .iter()
                .map(|v| {
                    v.as_str().ok_or_else(|| {
                        BridgeError::Schema(format!("property '{name}' has non-string type {v}"))
                    })
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(BridgeError::Schema(format!(
                    "property '{name}' has invalid type {other}"
                )))
            }
        };
        let members = names
            .into_iter()
            .map(|type_name| named_type(name, type_name, property))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(fold_members(members));
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = property.get(key) {
            let mut members = Vec::with_capacity(branches.len());
            let mut nullable = false;
            for branch in branches {
                let branch = branch.as_object().ok_or_else(|| {
                    BridgeError::Schema(format!("property '{name}' has a non-object {key} branch"))
                })?;
                let (ty, branch_nullable) = property_type(name, branch)?;
                nullable |= branch_nullable;
                members.push(ty);
            }
            let (ty, folded_nullable) = fold_members(members);
            return Ok((ty, nullable || folded_nullable));
        }
    }

    Ok((NativeType::Text, false))
}

fn fold_members(members: Vec<NativeType>) -> (NativeType, bool) {
    let nullable = members.iter().any(|m| *m == NativeType::Null);
    let non_null: Vec<_> = members
        .into_iter()
        .filter(|m| *m != NativeType::Null)
        .collect();
    if non_null.is_empty() {
        return (NativeType::Null, true);
    }
    (NativeType::union(non_null), nullable)
}

fn named_type(
    field: &str,
    type_name: &str,
    property: &Map<String, Value>,
) -> Result<NativeType, BridgeError> {
    Ok(match type_name {
        "string" => NativeType::Text,
        "integer" => NativeType::Int,
        "number" => NativeType::Float,
        "boolean" => NativeType::Bool,
        "object" => NativeType::Mapping,
        "null" => NativeType::Null,
        "array" => {
            let item = match property.get("items") {
                Some(Value::Object(items)) => {
                    let (ty, nullable) = property_type(field, items)?;
                    if nullable && ty != NativeType::Null {
                        NativeType::union([ty, NativeType::Null])
                    } else {
                        ty
                    }
                }
                _ => NativeType::Any,
            };
            NativeType::Sequence(Box::new(item))
        }
        other => {
            return Err(BridgeError::Schema(format!(
                "property '{field}' has unknown type '{other}'"
            )))
        }
    })
}
