use async_trait::async_trait;
use relaycore::{FunctionContext, FunctionError, FunctionResult, NodeFunction};
use serde_json::{json, Map, Value};
use tokio::time::{sleep, Duration};

/// Upper bound on a single delay; longer requests are clamped.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Sleeps for `params.delay_ms` milliseconds (default 1000).
pub struct DelayFunction;

#[async_trait]
impl NodeFunction for DelayFunction {
    fn function_id(&self) -> &str {
        "time.delay"
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let requested = params
            .get("delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(1000);
        let delay_ms = requested.min(MAX_DELAY_MS);

        ctx.log(format!("delaying for {}ms", delay_ms)).await;
        sleep(Duration::from_millis(delay_ms)).await;

        Ok(FunctionResult::ok(json!(delay_ms)))
    }
}
