use crate::compiler::{CompiledNode, CompiledWorkflow, Strategy};
use crate::middleware::{Composed, Middleware};
use crate::profiler::{NodeProfile, NodeProfiler};
use chrono::Utc;
use futures::future::join_all;
use relaycore::{
    EventBus, ExecutionEvent, ExecutionId, FunctionCatalog, FunctionContext, FunctionResult,
    MemoryLimits, MockSpec, NodeDef, RunError, SharedStore, StoreSnapshot, CLUSTER_OUTPUTS_KEY,
    DEFAULT_ACTION, ERROR_ACTION,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};

/// Observer callbacks fired around every node execution.
///
/// All methods default to no-ops; implementations override the ones
/// they care about. Callbacks run inline on the engine's task, so they
/// should return quickly.
pub trait DebugHooks: Send + Sync {
    fn on_node_start(&self, _node_id: &str) {}

    fn on_node_complete(&self, _node_id: &str, _result: &FunctionResult) {}

    fn on_node_profile(&self, _profile: &NodeProfile) {}
}

/// Engine-level settings shared by every run.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Traversal steps allowed before a run is halted as runaway.
    pub max_iterations: u32,
    /// Memory limits applied when a run does not bring its own.
    pub limits: MemoryLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            limits: MemoryLimits::default(),
        }
    }
}

/// Per-run inputs and knobs.
#[derive(Default)]
pub struct RunOptions {
    /// Initial contents of the store's data map.
    pub initial_data: Map<String, Value>,
    /// Run-level environment, the lowest-precedence layer.
    pub env: HashMap<String, String>,
    /// Mock overrides keyed by node id.
    pub mocks: HashMap<String, MockSpec>,
    /// Overrides the engine-level memory limits for this run.
    pub limits: Option<MemoryLimits>,
    pub hooks: Option<Arc<dyn DebugHooks>>,
    /// Capture RSS and CPU around each node and fire `on_node_profile`.
    pub profiling: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial_data.insert(key.into(), value);
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_mock(mut self, node_id: impl Into<String>, mock: MockSpec) -> Self {
        self.mocks.insert(node_id.into(), mock);
        self
    }

    pub fn with_limits(mut self, limits: MemoryLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn DebugHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_profiling(mut self) -> Self {
        self.profiling = true;
        self
    }
}

/// Structured outcome of a run.
///
/// A report is always produced: fatal node failures, missing nodes and
/// the iteration cap all surface here rather than as call errors, with
/// partial progress intact in the store snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: ExecutionId,
    pub success: bool,
    pub error: Option<RunError>,
    pub store: StoreSnapshot,
    /// Nodes executed on the main traversal path.
    pub steps: u32,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn data(&self) -> &Map<String, Value> {
        &self.store.data
    }

    pub fn logs(&self) -> &[String] {
        &self.store.logs
    }

    pub fn node_result(&self, node_id: &str) -> Option<&FunctionResult> {
        self.store.node_results.get(node_id)
    }
}

/// Walks a compiled workflow: dispatches each node through its
/// strategy, routes on the returned action, and halts on fatal
/// failures, dead ends or the iteration cap.
pub struct Engine {
    catalog: Arc<dyn FunctionCatalog>,
    middleware: Vec<Arc<dyn Middleware>>,
    bus: Arc<EventBus>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(catalog: Arc<dyn FunctionCatalog>) -> Self {
        Self::with_config(catalog, EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn FunctionCatalog>, config: EngineConfig) -> Self {
        Self {
            catalog,
            middleware: Vec::new(),
            bus: Arc::new(EventBus::new(1000)),
            config,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Append a middleware to the chain. Registration order is
    /// outermost-first.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Execute a compiled workflow to a terminal state.
    pub async fn run(&self, workflow: &CompiledWorkflow, options: RunOptions) -> RunReport {
        let execution_id = ExecutionId::new_v4();
        let started = Instant::now();
        let limits = options.limits.unwrap_or(self.config.limits);

        // Workflow-level env overrides run-level; node-level overrides
        // are merged per step.
        let mut base_env = options.env;
        for (name, value) in &workflow.env {
            base_env.insert(name.clone(), value.clone());
        }
        let store = SharedStore::for_run(options.initial_data, base_env, options.mocks);

        self.bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_name: workflow.name.clone(),
            start_node_id: workflow.start_node_id.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            %execution_id,
            start = %workflow.start_node_id,
            "starting workflow run"
        );

        let mut current = Some(workflow.start_node_id.clone());
        let mut steps: u32 = 0;
        let mut run_error: Option<RunError> = None;
        let mut profiler = options.profiling.then(NodeProfiler::new);

        while let Some(node_id) = current.take() {
            if steps >= self.config.max_iterations {
                let error = RunError::for_run(format!(
                    "iteration limit {} exceeded at node '{}'",
                    self.config.max_iterations, node_id
                ));
                tracing::warn!(%execution_id, node = %node_id, "halting runaway workflow");
                store.set_last_error(error.clone()).await;
                run_error = Some(error);
                break;
            }
            steps += 1;

            let Some(node) = workflow.node(&node_id) else {
                let error = RunError::at_node(&node_id, format!("node not found: {}", node_id));
                store.set_last_error(error.clone()).await;
                run_error = Some(error);
                break;
            };

            if let Some(hooks) = &options.hooks {
                hooks.on_node_start(&node_id);
            }
            self.bus.emit(ExecutionEvent::NodeStarted {
                execution_id,
                node_id: node_id.clone(),
                function_id: node.def.function_id.clone(),
                timestamp: Utc::now(),
            });

            let mut env = store.env().await;
            for (name, value) in &node.def.env {
                env.insert(name.clone(), value.clone());
            }

            let sample = profiler.as_mut().map(|p| p.begin());
            let node_started = Instant::now();

            let result = match store.mock_for(&node_id).await {
                Some(mock) => self.apply_mock(&node_id, mock, &store).await,
                None => self.execute_strategy(node, &store, env).await,
            };

            let node_duration = node_started.elapsed().as_millis() as u64;
            if let (Some(profiler), Some(sample)) = (profiler.as_mut(), sample) {
                let profile = profiler.finish(&node_id, sample);
                if let Some(hooks) = &options.hooks {
                    hooks.on_node_profile(&profile);
                }
            }

            store.record_result(&node_id, result.clone()).await;
            if let Some(hooks) = &options.hooks {
                hooks.on_node_complete(&node_id, &result);
            }

            if result.success {
                let action = result
                    .action
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ACTION.to_string());
                store
                    .log(
                        &node_id,
                        &format!("completed in {}ms (action={})", node_duration, action),
                    )
                    .await;
                self.bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id,
                    node_id: node_id.clone(),
                    action: result.action.clone(),
                    duration_ms: node_duration,
                    timestamp: Utc::now(),
                });
                store.enforce_limits(&limits).await;

                current = workflow.route(&node_id, &action);
                if current.is_none() {
                    tracing::debug!(node = %node_id, %action, "no outgoing edge; halting cleanly");
                }
            } else {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("node '{}' reported failure", node_id));
                store.log(&node_id, &format!("failed: {}", message)).await;
                self.bus.emit(ExecutionEvent::NodeFailed {
                    execution_id,
                    node_id: node_id.clone(),
                    error: message.clone(),
                    timestamp: Utc::now(),
                });
                let error = RunError::at_node(&node_id, message);
                store.set_last_error(error.clone()).await;
                store.enforce_limits(&limits).await;
                run_error = Some(error);
                break;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let success = run_error.is_none();
        self.bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            success,
            steps,
            duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(%execution_id, success, steps, duration_ms, "workflow run finished");

        RunReport {
            execution_id,
            success,
            error: run_error,
            store: store.snapshot().await,
            steps,
            duration_ms,
        }
    }

    async fn execute_strategy(
        &self,
        node: &CompiledNode,
        store: &SharedStore,
        env: HashMap<String, String>,
    ) -> FunctionResult {
        match node.strategy {
            Strategy::Regular => self.run_regular(&node.def, store, env).await,
            Strategy::SequentialBatch => self.run_batch(&node.def, store, env, false).await,
            Strategy::ParallelBatch => self.run_batch(&node.def, store, env, true).await,
            Strategy::ClusterRoot => self.run_cluster(node, store, env).await,
        }
    }

    /// Invoke a node's function through the middleware chain, retrying
    /// raised errors per the node's retry policy. A returned result with
    /// `success: false` is deliberate and is never retried.
    async fn run_regular(
        &self,
        def: &NodeDef,
        store: &SharedStore,
        env: HashMap<String, String>,
    ) -> FunctionResult {
        let Some(function) = self.compose(&def.function_id) else {
            return FunctionResult::fail(format!("function not found: {}", def.function_id));
        };

        let attempts = def.retry.attempts();
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let ctx = FunctionContext::new(&def.id, store.clone()).with_env(env.clone());
            match function.invoke(def.params.clone(), ctx).await {
                Ok(result) => return result,
                Err(err) => {
                    tracing::warn!(node = %def.id, attempt, "function raised: {}", err);
                    store
                        .log(
                            &def.id,
                            &format!("attempt {}/{} raised: {}", attempt, attempts, err),
                        )
                        .await;
                    last_error = err.to_string();
                    if attempt < attempts && def.retry.retry_delay_ms > 0 {
                        sleep(Duration::from_millis(def.retry.retry_delay_ms)).await;
                    }
                }
            }
        }

        FunctionResult::fail(format!(
            "retries exhausted after {} attempt(s): {}",
            attempts, last_error
        ))
    }

    /// Fan a processor function over `params.array`, one invocation per
    /// item. Item failures null out their output slot; the batch node
    /// itself always succeeds, signalling trouble through the `error`
    /// action.
    async fn run_batch(
        &self,
        def: &NodeDef,
        store: &SharedStore,
        env: HashMap<String, String>,
        parallel: bool,
    ) -> FunctionResult {
        let Some(Value::Array(items)) = def.params.get("array").cloned() else {
            return FunctionResult::fail(format!(
                "batch node '{}' requires an array under params.array",
                def.id
            ));
        };
        let Some(processor_id) = def.params.get("processorFunction").and_then(Value::as_str)
        else {
            return FunctionResult::fail(format!(
                "batch node '{}' requires a function id under params.processorFunction",
                def.id
            ));
        };
        let Some(processor) = self.compose(processor_id) else {
            return FunctionResult::fail(format!("function not found: {}", processor_id));
        };

        let processor_params = match def.params.get("processorParams") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let output_key = def
            .params
            .get("outputKey")
            .and_then(Value::as_str)
            .unwrap_or("batchOutput")
            .to_string();

        let total = items.len();
        let mut outputs: Vec<Value> = Vec::with_capacity(total);
        let mut failed = 0usize;

        if parallel {
            let invocations: Vec<_> = items
                .into_iter()
                .map(|item| {
                    let mut params = processor_params.clone();
                    params.insert("currentItem".to_string(), item);
                    let ctx = FunctionContext::new(&def.id, store.clone()).with_env(env.clone());
                    let processor = &processor;
                    async move { processor.invoke(params, ctx).await }
                })
                .collect();

            for (index, outcome) in join_all(invocations).await.into_iter().enumerate() {
                match outcome {
                    Ok(result) if result.success => outputs.push(result.output),
                    Ok(result) => {
                        failed += 1;
                        let message = result.error.unwrap_or_default();
                        store
                            .log(&def.id, &format!("item {} failed: {}", index, message))
                            .await;
                        outputs.push(Value::Null);
                    }
                    Err(err) => {
                        failed += 1;
                        store
                            .log(&def.id, &format!("item {} raised: {}", index, err))
                            .await;
                        outputs.push(Value::Null);
                    }
                }
            }
        } else {
            for (index, item) in items.into_iter().enumerate() {
                let mut params = processor_params.clone();
                params.insert("currentItem".to_string(), item);
                let ctx = FunctionContext::new(&def.id, store.clone()).with_env(env.clone());
                match processor.invoke(params, ctx).await {
                    Ok(result) if result.success => outputs.push(result.output),
                    Ok(result) => {
                        failed += 1;
                        let message = result.error.unwrap_or_default();
                        store
                            .log(&def.id, &format!("item {} failed: {}", index, message))
                            .await;
                        outputs.push(Value::Null);
                    }
                    Err(err) => {
                        failed += 1;
                        store
                            .log(&def.id, &format!("item {} raised: {}", index, err))
                            .await;
                        outputs.push(Value::Null);
                    }
                }
            }
        }

        store.set(output_key, Value::Array(outputs.clone())).await;
        store
            .log(
                &def.id,
                &format!("processed {} item(s), {} failed", total, failed),
            )
            .await;

        let action = if failed == 0 { DEFAULT_ACTION } else { ERROR_ACTION };
        FunctionResult::ok_with_action(Value::Array(outputs), action)
    }

    /// Run a cluster root with regular semantics, then fan out its
    /// sub-nodes concurrently. Sub-node outputs land in the store under
    /// `_clusterOutputs.<root id>`; a failed sub-node nulls its slot
    /// without failing the cluster. Routing continues from the root's
    /// own result.
    async fn run_cluster(
        &self,
        node: &CompiledNode,
        store: &SharedStore,
        env: HashMap<String, String>,
    ) -> FunctionResult {
        let root_result = self.run_regular(&node.def, store, env).await;
        if !root_result.success {
            return root_result;
        }

        let root_id = &node.def.id;
        let base_env = store.env().await;

        let mut invocations = Vec::new();
        for sub in &node.sub_nodes {
            let mut sub_env = base_env.clone();
            for (name, value) in &sub.env {
                sub_env.insert(name.clone(), value.clone());
            }
            let mock = store.mock_for(&sub.id).await;
            let composed = self.compose(&sub.function_id);
            let function_id = sub.function_id.clone();
            let sub_id = sub.id.clone();
            let params = sub.params.clone();
            let ctx = FunctionContext::new(&sub.id, store.clone()).with_env(sub_env);

            invocations.push(async move {
                if let Some(mock) = mock {
                    return self.apply_mock(&sub_id, mock, store).await;
                }
                match &composed {
                    Some(function) => match function.invoke(params, ctx).await {
                        Ok(result) => result,
                        Err(err) => FunctionResult::fail(format!("sub-node raised: {}", err)),
                    },
                    None => FunctionResult::fail(format!("function not found: {}", function_id)),
                }
            });
        }

        let results = join_all(invocations).await;

        let mut outputs = Map::new();
        for (sub, result) in node.sub_nodes.iter().zip(results) {
            if result.success {
                outputs.insert(sub.id.clone(), result.output.clone());
            } else {
                let message = result.error.clone().unwrap_or_default();
                store
                    .log(root_id, &format!("sub-node '{}' failed: {}", sub.id, message))
                    .await;
                outputs.insert(sub.id.clone(), Value::Null);
            }
            store.record_result(&sub.id, result).await;
        }

        store
            .with_data_mut(|data| {
                let entry = data
                    .entry(CLUSTER_OUTPUTS_KEY.to_string())
                    .or_insert_with(|| json!({}));
                if let Value::Object(map) = entry {
                    map.insert(root_id.clone(), Value::Object(outputs));
                }
            })
            .await;

        root_result
    }

    async fn apply_mock(&self, node_id: &str, mock: MockSpec, store: &SharedStore) -> FunctionResult {
        if let Some(delay) = mock.delay_ms {
            sleep(Duration::from_millis(delay)).await;
        }
        store
            .log(node_id, "mock override substituted for function invocation")
            .await;
        FunctionResult {
            output: mock.output,
            success: mock.success,
            action: mock.action,
            error: if mock.success {
                None
            } else {
                Some(format!("mock for '{}' reported failure", node_id))
            },
        }
    }

    /// Resolve a function id and wrap it in the middleware chain.
    /// Absence is a fatal error at invocation time, not compile time.
    fn compose(&self, function_id: &str) -> Option<Composed> {
        let target = self.catalog.resolve(function_id)?;
        Some(Composed::new(function_id, self.middleware.clone(), target))
    }
}
