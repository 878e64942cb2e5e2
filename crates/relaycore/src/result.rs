use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single function invocation.
///
/// `success` decides whether traversal continues; `action` is the routing
/// label and is only consulted on success. A function that wants routable
/// failure semantics returns `success: true` with an `"error"` action
/// rather than `success: false`, which halts the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    #[serde(default)]
    pub output: Value,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FunctionResult {
    /// Successful result with no explicit routing action
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            success: true,
            action: None,
            error: None,
        }
    }

    /// Successful result carrying a routing action
    pub fn ok_with_action(output: impl Into<Value>, action: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            action: Some(action.into()),
            error: None,
        }
    }

    /// Fatal failure; halts the run at this node
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            success: false,
            action: None,
            error: Some(error.into()),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Terminal error attached to a run report.
///
/// `node_id` is `None` when the failure belongs to the run itself (e.g.
/// the iteration cap) rather than to a specific node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub node_id: Option<String>,
    pub message: String,
}

impl RunError {
    pub fn at_node(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }

    pub fn for_run(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
        }
    }
}
