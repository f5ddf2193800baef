//! Inline `$ref` pointers against the document's own definitions.

use serde_json::{Map, Value};

use crate::error::BridgeError;

const DEFINITION_KEYS: [&str; 2] = ["$defs", "definitions"];

/// Return a copy of `schema` with every internal `$ref` inlined and the
/// definition tables removed.
///
/// Keywords placed next to a `$ref` override the referenced schema's own
/// keywords, so a local `description` survives resolution. A reference back
/// into a definition that is already being expanded is cut to a stub that only
/// keeps the target's `type`, so recursive models become mapping or any
/// fields. References that leave the document or point nowhere are schema
/// errors.
pub fn resolve_refs(schema: &Value) -> Result<Value, BridgeError> {
    let body = match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !DEFINITION_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    let mut stack = Vec::new();
    resolve_node(&body, schema, &mut stack)
}

fn resolve_node(node: &Value, root: &Value, stack: &mut Vec<String>) -> Result<Value, BridgeError> {
    match node {
        Value::Object(map) => match map.get("$ref") {
            Some(reference) => resolve_reference(reference, map, root, stack),
            None => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), resolve_node(value, root, stack)?);
                }
                Ok(Value::Object(out))
            }
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_node(item, root, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    reference: &Value,
    siblings: &Map<String, Value>,
    root: &Value,
    stack: &mut Vec<String>,
) -> Result<Value, BridgeError> {
    let reference = reference
        .as_str()
        .ok_or_else(|| BridgeError::Schema(format!("$ref must be a string, got {reference}")))?;
    let target = lookup(root, reference)?;
    let mut resolved = if stack.iter().any(|seen| seen == reference) {
        cycle_stub(target)
    } else {
        stack.push(reference.to_string());
        let resolved = resolve_node(target, root, stack);
        stack.pop();
        resolved?
    };

    if let Value::Object(resolved_map) = &mut resolved {
        for (key, value) in siblings {
            if key != "$ref" {
                resolved_map.insert(key.clone(), resolve_node(value, root, stack)?);
            }
        }
    }
    Ok(resolved)
}

fn cycle_stub(target: &Value) -> Value {
    let mut stub = Map::new();
    if let Some(ty) = target.get("type") {
        stub.insert("type".into(), ty.clone());
    }
    Value::Object(stub)
}

fn lookup<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, BridgeError> {
    let pointer = reference.strip_prefix('#').ok_or_else(|| {
        BridgeError::Schema(format!("external reference '{reference}' is not supported"))
    })?;
    if pointer.is_empty() {
        return Err(BridgeError::Schema(
            "reference to the document root cannot be inlined".into(),
        ));
    }
    root.pointer(pointer)
        .ok_or_else(|| BridgeError::Schema(format!("unresolvable reference '{reference}'")))
}
