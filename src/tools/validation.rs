//! Check completed tool arguments against the tool's parameter schema.

use serde_json::Value;

/// Validate `args` against a JSON Schema subset: `type`, `required`,
/// `properties` (recursively), `items` and string `enum`.
///
/// Returns a message naming the first offending path.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    check(args, schema, "arguments")
}

fn check(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(value, expected) {
            return Err(format!(
                "{path}: expected {expected}, got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{path}: {value} is not one of {}", Value::from(allowed.clone())));
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            if let Some(missing) = required
                .iter()
                .filter_map(Value::as_str)
                .find(|name| !object.contains_key(*name))
            {
                return Err(format!("{path}: missing required field '{missing}'"));
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, field) in object {
                if let Some(field_schema) = properties.get(key) {
                    check(field, field_schema, &format!("{path}.{key}"))?;
                }
            }
        }
    }

    if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
        for (idx, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{path}[{idx}]"))?;
        }
    }

    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParameters;
    use serde_json::json;

    fn weather_schema() -> Value {
        ToolParameters::object()
            .string("city", "City name", true)
            .string_enum("unit", "Temperature unit", &["c", "f"], false)
            .build()
            .schema
    }

    #[test]
    fn accepts_matching_arguments() {
        assert!(validate_arguments(&json!({"city": "NYC"}), &weather_schema()).is_ok());
        assert!(validate_arguments(&json!({"city": "NYC", "unit": "f", "extra": 1}), &weather_schema()).is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = validate_arguments(&json!({"unit": "c"}), &weather_schema()).unwrap_err();
        assert_eq!(err, "arguments: missing required field 'city'");
    }

    #[test]
    fn reports_wrong_root_type() {
        let err = validate_arguments(&json!("NYC"), &weather_schema()).unwrap_err();
        assert_eq!(err, "arguments: expected object, got string");
    }

    #[test]
    fn reports_enum_mismatch() {
        let err = validate_arguments(&json!({"city": "NYC", "unit": "k"}), &weather_schema()).unwrap_err();
        assert!(err.starts_with("arguments.unit:"), "{err}");
    }

    #[test]
    fn descends_into_nested_objects_and_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "orders": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "qty": { "type": "integer" } },
                        "required": ["qty"]
                    }
                }
            }
        });
        assert!(validate_arguments(&json!({"orders": [{"qty": 1}]}), &schema).is_ok());
        let err = validate_arguments(&json!({"orders": [{"qty": 1}, {"qty": 1.5}]}), &schema).unwrap_err();
        assert_eq!(err, "arguments.orders[1].qty: expected integer, got number");
    }

    #[test]
    fn schema_without_constraints_accepts_anything() {
        assert!(validate_arguments(&Value::Null, &json!({})).is_ok());
        assert!(validate_arguments(&json!([1, "a"]), &json!({})).is_ok());
    }
}
