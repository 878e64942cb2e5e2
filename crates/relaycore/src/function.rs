use crate::{FunctionError, FunctionResult, SharedStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Core trait for catalog functions invoked by workflow nodes
#[async_trait]
pub trait NodeFunction: Send + Sync {
    /// Unique function identifier (e.g. "http.fetch", "json.parse")
    fn function_id(&self) -> &str;

    /// Invoke the function with a node's params and run-scoped context.
    ///
    /// `Err` is the exception channel: the engine retries it per the
    /// node's retry policy. An `Ok` result with `success: false` is a
    /// deliberate failure and is never retried.
    async fn call(
        &self,
        params: Map<String, Value>,
        ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError>;
}

/// Lookup surface the engine uses to resolve function ids.
///
/// Absence of a referenced id is a fatal error at invocation time, not at
/// compile time.
pub trait FunctionCatalog: Send + Sync {
    fn has(&self, function_id: &str) -> bool;

    fn resolve(&self, function_id: &str) -> Option<Arc<dyn NodeFunction>>;

    fn function_ids(&self) -> Vec<String>;
}

/// Per-invocation view handed to every function
#[derive(Clone)]
pub struct FunctionContext {
    /// Id of the node being executed
    pub node_id: String,

    /// Run-scoped shared store handle
    pub store: SharedStore,

    /// Merged environment: run-level, then workflow-level, then node-level
    /// overrides, later layers winning
    pub env: HashMap<String, String>,
}

impl FunctionContext {
    pub fn new(node_id: impl Into<String>, store: SharedStore) -> Self {
        Self {
            node_id: node_id.into(),
            store,
            env: HashMap::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Lookup over the merged environment layers
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Append a timestamped line to the run log, prefixed with this node's
    /// id
    pub async fn log(&self, message: impl AsRef<str>) {
        self.store.log(&self.node_id, message.as_ref()).await;
    }
}
