use crate::params::{require_str, require_value};
use async_trait::async_trait;
use relaycore::{FunctionContext, FunctionError, FunctionResult, NodeFunction};
use serde_json::{Map, Value};

/// Parses `params.text` as JSON and outputs the parsed value.
pub struct JsonParseFunction;

#[async_trait]
impl NodeFunction for JsonParseFunction {
    fn function_id(&self) -> &str {
        "json.parse"
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        _ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let text = require_str(&params, "text")?;
        let parsed: Value = serde_json::from_str(text)
            .map_err(|e| FunctionError::ExecutionFailed(format!("JSON parse error: {}", e)))?;
        Ok(FunctionResult::ok(parsed))
    }
}

/// Serializes `params.value` to a JSON string; `params.pretty` switches
/// to indented output.
pub struct JsonStringifyFunction;

#[async_trait]
impl NodeFunction for JsonStringifyFunction {
    fn function_id(&self) -> &str {
        "json.stringify"
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        _ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let value = require_value(&params, "value")?;
        let pretty = params
            .get("pretty")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let text = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| FunctionError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(FunctionResult::ok(text))
    }
}
