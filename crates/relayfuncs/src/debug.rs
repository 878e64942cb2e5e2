use async_trait::async_trait;
use relaycore::{FunctionContext, FunctionError, FunctionResult, NodeFunction};
use serde_json::{Map, Value};

/// Writes `params.message` to the run log and passes `params.value`
/// through as its output.
pub struct LogFunction;

#[async_trait]
impl NodeFunction for LogFunction {
    fn function_id(&self) -> &str {
        "debug.log"
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("(no message)");
        ctx.log(message).await;

        let value = params.get("value").cloned().unwrap_or(Value::Null);
        Ok(FunctionResult::ok(value))
    }
}
