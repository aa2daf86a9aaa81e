//! Schema generation
//!
//! Builds the JSON Schema advertised for each tool from its declared
//! parameters, and the reverse: deriving parameter declarations from a Rust
//! type so typed handlers describe themselves.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde_json::Value;

use crate::endpoint::{JsonObject, ParamKind, ParamSpec};

/// Build a tool input schema from declared parameters.
///
/// Root is always `"type": "object"`. Defaults and descriptions carry over
/// into the per-property schemas.
pub fn input_schema(params: &[ParamSpec]) -> JsonObject {
    let mut properties = JsonObject::new();
    let mut required: Vec<Value> = Vec::new();

    for param in params {
        let mut property = JsonObject::new();
        property.insert("type".to_string(), Value::String(param.kind.json_type().to_string()));
        if let Some(text) = &param.description {
            property.insert("description".to_string(), Value::String(text.clone()));
        }
        if let Some(default) = &param.default {
            property.insert("default".to_string(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(property));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), Value::Array(required));
    schema
}

/// Derive parameter declarations from a type's JSON Schema.
///
/// Used by typed handlers: the input struct derives `JsonSchema` and its
/// top-level properties become the tool parameters. Nullable unions take
/// their first non-null type; anything without a recognizable type falls
/// back to string.
pub fn params_from_schema<T: JsonSchema>() -> Vec<ParamSpec> {
    let schema = serde_json::to_value(schemars::schema_for!(T)).expect("Schema should serialize");

    let required: HashSet<String> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, property)| ParamSpec {
            name: name.clone(),
            kind: kind_of(property),
            required: required.contains(name),
            default: property.get("default").cloned(),
            description: property
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

fn kind_of(property: &Value) -> ParamKind {
    match property.get("type") {
        Some(Value::String(name)) => ParamKind::from_json_type(name).unwrap_or(ParamKind::String),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null")
            .and_then(ParamKind::from_json_type)
            .unwrap_or(ParamKind::String),
        _ => ParamKind::String,
    }
}
