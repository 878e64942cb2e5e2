use crate::params::require_str;
use async_trait::async_trait;
use relaycore::{FunctionContext, FunctionError, FunctionResult, NodeFunction, ERROR_ACTION};
use serde_json::{json, Map, Value};

/// Performs an HTTP request described by params.
///
/// `url` is required; `method` defaults to GET. A `body` param is sent
/// as JSON unless it is a string, and `headers` is an object of
/// string values. The output is `{status, headers, body}` with the body
/// parsed as JSON when possible. Non-2xx responses succeed with the
/// `error` action so workflows can branch on them.
pub struct HttpFetchFunction {
    client: reqwest::Client,
}

impl HttpFetchFunction {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetchFunction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeFunction for HttpFetchFunction {
    fn function_id(&self) -> &str {
        "http.fetch"
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let url = require_str(&params, "url")?;
        let method = params
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        ctx.log(format!("{} {}", method, url)).await;

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            other => {
                return Err(FunctionError::Configuration(format!(
                    "unsupported method: {}",
                    other
                )))
            }
        };

        if let Some(body) = params.get("body") {
            request = match body {
                Value::String(text) => request.body(text.clone()),
                other => request.json(other),
            };
        }

        if let Some(Value::Object(headers)) = params.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| FunctionError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Value::String(value.to_str().unwrap_or("").to_string()),
                )
            })
            .collect();
        let text = response.text().await.map_err(|e| {
            FunctionError::ExecutionFailed(format!("failed to read response body: {}", e))
        })?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        ctx.log(format!("response status {}", status)).await;

        let result = FunctionResult::ok(json!({
            "status": status,
            "headers": headers,
            "body": body,
        }));
        if (200..300).contains(&status) {
            Ok(result)
        } else {
            Ok(result.with_action(ERROR_ACTION))
        }
    }
}
