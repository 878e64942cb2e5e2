use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-node substitute result that bypasses real invocation entirely.
///
/// When an enabled mock exists for a node id, the engine uses its
/// `{output, success, action}` in place of calling the catalog function,
/// after an optional artificial delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default = "success_default")]
    pub success: bool,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

fn enabled_default() -> bool {
    true
}

fn success_default() -> bool {
    true
}

impl MockSpec {
    /// Enabled mock returning the given output successfully
    pub fn returning(output: impl Into<Value>) -> Self {
        Self {
            enabled: true,
            output: output.into(),
            success: true,
            action: None,
            delay_ms: None,
        }
    }

    /// Enabled mock reporting failure (halts the run at this node)
    pub fn failing() -> Self {
        Self {
            enabled: true,
            output: Value::Null,
            success: false,
            action: None,
            delay_ms: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
