use crate::{FunctionResult, MockSpec, RunError};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Caps applied to the store after every node completes
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimits {
    /// Log lines retained (oldest trimmed, replaced by one marker line)
    pub max_logs: usize,
    /// Per-node results retained (evicted oldest-first)
    pub max_node_results: usize,
    /// Serialized data size that triggers a warning; never truncates
    pub max_data_bytes: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_logs: 1000,
            max_node_results: 1000,
            max_data_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Run-scoped mutable state threaded through every node invocation.
///
/// Cloning the handle shares the underlying state. A store is created once
/// per run, mutated by every strategy, and handed back to the caller at
/// run end; it is never shared across concurrent runs. Concurrent item
/// processing inside one run may interleave reads and writes to the same
/// key at await points; the lock protects map integrity, not
/// read-modify-write atomicity.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    data: Map<String, Value>,
    logs: Vec<String>,
    env: HashMap<String, String>,
    node_results: HashMap<String, FunctionResult>,
    result_order: VecDeque<String>,
    last_error: Option<RunError>,
    mocks: HashMap<String, MockSpec>,
    truncated_logs: usize,
    data_size_warned: bool,
}

/// Point-in-time copy of the store, returned to callers in run reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub data: Map<String, Value>,
    pub logs: Vec<String>,
    pub env: HashMap<String, String>,
    pub node_results: HashMap<String, FunctionResult>,
    pub last_error: Option<RunError>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Create the store for a run with initial data, environment and mocks
    pub fn for_run(
        data: Map<String, Value>,
        env: HashMap<String, String>,
        mocks: HashMap<String, MockSpec>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                data,
                env,
                mocks,
                ..StoreState::default()
            })),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        let mut state = self.inner.write().await;
        state.data.insert(key.into(), value);
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let state = self.inner.read().await;
        state.data.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.inner.write().await;
        state.data.remove(key)
    }

    /// Compound update under a single lock acquisition
    pub async fn with_data_mut<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut state = self.inner.write().await;
        f(&mut state.data)
    }

    pub async fn data(&self) -> Map<String, Value> {
        let state = self.inner.read().await;
        state.data.clone()
    }

    /// Append a timestamped, node-prefixed line to the run log
    pub async fn log(&self, node_id: &str, message: &str) {
        let line = format!(
            "[{}] [{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            node_id,
            message
        );
        tracing::debug!(node_id, "{}", message);
        let mut state = self.inner.write().await;
        state.logs.push(line);
    }

    pub async fn logs(&self) -> Vec<String> {
        let state = self.inner.read().await;
        state.logs.clone()
    }

    pub async fn log_count(&self) -> usize {
        let state = self.inner.read().await;
        state.logs.len()
    }

    pub async fn env_var(&self, name: &str) -> Option<String> {
        let state = self.inner.read().await;
        state.env.get(name).cloned()
    }

    pub async fn env(&self) -> HashMap<String, String> {
        let state = self.inner.read().await;
        state.env.clone()
    }

    /// Record a node's result. Re-recording an existing id overwrites the
    /// entry but keeps its original position in the eviction order.
    pub async fn record_result(&self, node_id: impl Into<String>, result: FunctionResult) {
        let node_id = node_id.into();
        let mut state = self.inner.write().await;
        if state.node_results.insert(node_id.clone(), result).is_none() {
            state.result_order.push_back(node_id);
        }
    }

    pub async fn node_result(&self, node_id: &str) -> Option<FunctionResult> {
        let state = self.inner.read().await;
        state.node_results.get(node_id).cloned()
    }

    pub async fn result_count(&self) -> usize {
        let state = self.inner.read().await;
        state.node_results.len()
    }

    pub async fn set_last_error(&self, error: RunError) {
        let mut state = self.inner.write().await;
        state.last_error = Some(error);
    }

    pub async fn last_error(&self) -> Option<RunError> {
        let state = self.inner.read().await;
        state.last_error.clone()
    }

    /// Mock override for a node, if one is present and enabled
    pub async fn mock_for(&self, node_id: &str) -> Option<MockSpec> {
        let state = self.inner.read().await;
        state.mocks.get(node_id).filter(|m| m.enabled).cloned()
    }

    /// Apply memory governance; called after every node completes.
    ///
    /// Logs beyond `max_logs` are trimmed from the oldest end and replaced
    /// by a single cumulative `[SYSTEM] truncated N entries` marker. Node
    /// results beyond `max_node_results` are evicted oldest-first. Data
    /// size beyond `max_data_bytes` logs one warning per run and never
    /// truncates.
    pub async fn enforce_limits(&self, limits: &MemoryLimits) {
        let mut state = self.inner.write().await;

        if !state.data_size_warned {
            let bytes = serde_json::to_vec(&state.data).map(|b| b.len()).unwrap_or(0);
            if bytes > limits.max_data_bytes {
                tracing::warn!(
                    bytes,
                    limit = limits.max_data_bytes,
                    "store data size exceeds configured limit"
                );
                state.logs.push(format!(
                    "[SYSTEM] store data size {} bytes exceeds limit of {} bytes",
                    bytes, limits.max_data_bytes
                ));
                state.data_size_warned = true;
            }
        }

        if state.logs.len() > limits.max_logs {
            let keep = limits.max_logs.saturating_sub(1);
            let drop = state.logs.len() - keep;
            // an existing marker at the head is replaced, not re-counted
            let newly_dropped = if state.truncated_logs > 0 { drop - 1 } else { drop };
            state.truncated_logs += newly_dropped;
            state.logs.drain(..drop);
            let marker = format!("[SYSTEM] truncated {} entries", state.truncated_logs);
            state.logs.insert(0, marker);
        }

        while state.result_order.len() > limits.max_node_results {
            if let Some(oldest) = state.result_order.pop_front() {
                state.node_results.remove(&oldest);
            }
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.read().await;
        StoreSnapshot {
            data: state.data.clone(),
            logs: state.logs.clone(),
            env: state.env.clone(),
            node_results: state.node_results.clone(),
            last_error: state.last_error.clone(),
        }
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}
