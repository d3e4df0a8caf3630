//! Minimal JSON-schema checks run at the dispatch boundary.
//!
//! Covers what tool schemas actually use: `required`, primitive `type`
//! (a single name or a list of names), `enum`, and `minimum`. Nested
//! objects and array items are checked with the same rules.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("{at} must be {expected}, got {found}")]
    WrongType {
        at: String,
        expected: String,
        found: &'static str,
    },

    #[error("missing required parameter '{0}'")]
    MissingRequired(String),

    #[error("{at} must be one of {allowed}")]
    NotInEnum { at: String, allowed: String },

    #[error("{at} must be at least {minimum}")]
    BelowMinimum { at: String, minimum: f64 },
}

/// Validate `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), SchemaError> {
    check(schema, value, "arguments")
}

fn check(schema: &Value, value: &Value, at: &str) -> Result<(), SchemaError> {
    if let Some(expected) = schema.get("type") {
        let names: Vec<&str> = match expected {
            Value::String(name) => vec![name.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !names.is_empty() && !names.iter().any(|name| matches_type(name, value)) {
            return Err(SchemaError::WrongType {
                at: at.to_string(),
                expected: names.join(" or "),
                found: type_name(value),
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        let allowed = allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
        return Err(SchemaError::NotInEnum {
            at: at.to_string(),
            allowed,
        });
    }

    if let (Some(minimum), Some(actual)) = (schema.get("minimum").and_then(Value::as_f64), value.as_f64())
        && actual < minimum
    {
        return Err(SchemaError::BelowMinimum {
            at: at.to_string(),
            minimum,
        });
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for key in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(key) {
                        return Err(SchemaError::MissingRequired(key.to_string()));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, property) in properties {
                    // null stands in for "not provided" from some backends
                    if let Some(child) = map.get(key).filter(|v| !v.is_null()) {
                        check(property, child, &format!("'{key}'"))?;
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{at}[{index}]"))?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "start_line": { "type": "integer", "minimum": 1 },
                "role": { "type": "string", "enum": ["user", "assistant", "tool"] },
                "patterns": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["path"]
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"path": "a.rs", "start_line": 3, "role": "tool", "patterns": ["*.log"]});
        assert!(validate(&file_schema(), &args).is_ok());
    }

    #[test]
    fn missing_required_key() {
        let err = validate(&file_schema(), &json!({"start_line": 1})).unwrap_err();
        assert_eq!(err, SchemaError::MissingRequired("path".into()));
    }

    #[test]
    fn wrong_primitive_type() {
        let err = validate(&file_schema(), &json!({"path": 42})).unwrap_err();
        assert!(matches!(err, SchemaError::WrongType { found: "integer", .. }));
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn top_level_must_be_object() {
        let err = validate(&file_schema(), &json!(["a.rs"])).unwrap_err();
        assert!(matches!(err, SchemaError::WrongType { .. }));
    }

    #[test]
    fn enum_and_minimum_constraints() {
        let err = validate(&file_schema(), &json!({"path": "a", "role": "system"})).unwrap_err();
        assert!(matches!(err, SchemaError::NotInEnum { .. }));

        let err = validate(&file_schema(), &json!({"path": "a", "start_line": 0})).unwrap_err();
        assert!(matches!(err, SchemaError::BelowMinimum { .. }));
    }

    #[test]
    fn array_items_checked() {
        let err = validate(&file_schema(), &json!({"path": "a", "patterns": ["ok", 1]})).unwrap_err();
        assert!(err.to_string().contains("[1]"));
    }

    #[test]
    fn union_types_accept_any_member() {
        let schema = json!({
            "type": "object",
            "properties": { "add_file": { "type": ["string", "object", "array"] } }
        });
        assert!(validate(&schema, &json!({"add_file": "a.rs"})).is_ok());
        assert!(validate(&schema, &json!({"add_file": [{"path": "a.rs"}]})).is_ok());
        assert!(validate(&schema, &json!({"add_file": 3})).is_err());
    }

    #[test]
    fn null_optional_values_are_skipped() {
        assert!(validate(&file_schema(), &json!({"path": "a", "start_line": null})).is_ok());
    }
}
