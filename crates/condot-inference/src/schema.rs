//! Strict output schemas and the parse-and-validate step.
//!
//! Model output is untrusted input. Every structured answer goes through
//! [`parse_strict`], which accepts it only if it deserializes into the target
//! type without defaults or unknown fields.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use condot_core::{OutputSchema, Result};

use crate::error::ClassifyError;

/// Build the schema descriptor sent with a structured generation request.
///
/// Subschemas are inlined so the descriptor has no `$ref`s, and every object
/// node is closed with `additionalProperties: false`, which strict structured
/// output requires.
pub fn output_schema<T: JsonSchema>(name: &str) -> Result<OutputSchema> {
    let generator = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let root = generator.into_root_schema_for::<T>();
    let mut schema = serde_json::to_value(root)?;
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
        map.remove("definitions");
    }
    close_objects(&mut schema);
    Ok(OutputSchema {
        name: name.to_string(),
        schema,
    })
}

fn is_object_node(map: &serde_json::Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => false,
    }
}

fn close_objects(node: &mut Value) {
    match node {
        Value::Object(map) => {
            if is_object_node(map) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for child in map.values_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

/// Object nodes (by JSON pointer) that still accept unknown properties.
pub fn open_objects(schema: &Value) -> Vec<String> {
    fn walk(node: &Value, pointer: String, out: &mut Vec<String>) {
        match node {
            Value::Object(map) => {
                if is_object_node(map)
                    && map.get("additionalProperties") != Some(&Value::Bool(false))
                {
                    out.push(pointer.clone());
                }
                for (key, child) in map {
                    walk(child, format!("{}/{}", pointer, key), out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk(child, format!("{}/{}", pointer, i), out);
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(schema, String::new(), &mut out);
    out
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output into `T`, classifying every failure.
pub fn parse_strict<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, ClassifyError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| ClassifyError::MalformedJson(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| ClassifyError::SchemaViolation(e.to_string()))
}
