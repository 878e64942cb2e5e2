use relaycore::FunctionError;
use serde_json::{Map, Value};

pub(crate) fn require_str<'a>(
    params: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, FunctionError> {
    match params.get(field) {
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(FunctionError::InvalidParamType {
            field: field.to_string(),
            expected: "string".to_string(),
            actual: type_name(other).to_string(),
        }),
        None => Err(FunctionError::MissingParam(field.to_string())),
    }
}

pub(crate) fn require_value<'a>(
    params: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Value, FunctionError> {
    params
        .get(field)
        .ok_or_else(|| FunctionError::MissingParam(field.to_string()))
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
