use crate::compiler::{compile, CompiledWorkflow};
use crate::engine::{Engine, EngineConfig, RunOptions, RunReport};
use crate::middleware::Middleware;
use relaycore::{
    EngineError, EventBus, ExecutionEvent, FunctionCatalog, MemoryLimits, WorkflowDefinition,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Settings for a [`RelayRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Traversal steps allowed before a run is halted as runaway.
    pub max_iterations: u32,
    /// Buffered capacity of the event bus.
    pub event_capacity: usize,
    /// Memory limits applied to runs that do not bring their own.
    pub limits: MemoryLimits,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            event_capacity: 1000,
            limits: MemoryLimits::default(),
        }
    }
}

/// Facade bundling a function catalog, middleware chain and event bus
/// behind a single run entry point.
///
/// Functions are registered on a catalog up front; the runtime then
/// compiles definitions and executes them with a fresh engine per run,
/// all runs sharing the same event bus.
pub struct RelayRuntime {
    catalog: Arc<dyn FunctionCatalog>,
    middleware: Vec<Arc<dyn Middleware>>,
    bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl RelayRuntime {
    pub fn new(catalog: Arc<dyn FunctionCatalog>) -> Self {
        Self::with_config(catalog, RuntimeConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn FunctionCatalog>, config: RuntimeConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.event_capacity));
        Self {
            catalog,
            middleware: Vec::new(),
            bus,
            config,
        }
    }

    /// Append a middleware to the chain applied around every function
    /// invocation. Registration order is outermost-first.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn catalog(&self) -> &Arc<dyn FunctionCatalog> {
        &self.catalog
    }

    /// Compile a definition without running it.
    pub fn compile(&self, definition: &WorkflowDefinition) -> Result<CompiledWorkflow, EngineError> {
        compile(definition).map_err(EngineError::Compile)
    }

    /// Compile and execute a workflow definition.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        options: RunOptions,
    ) -> Result<RunReport, EngineError> {
        let compiled = self.compile(definition)?;
        Ok(self.run_compiled(&compiled, options).await)
    }

    /// Execute an already-compiled workflow.
    pub async fn run_compiled(&self, workflow: &CompiledWorkflow, options: RunOptions) -> RunReport {
        self.engine().run(workflow, options).await
    }

    fn engine(&self) -> Engine {
        let config = EngineConfig {
            max_iterations: self.config.max_iterations,
            limits: self.config.limits,
        };
        let mut engine =
            Engine::with_config(self.catalog.clone(), config).with_event_bus(self.bus.clone());
        for middleware in &self.middleware {
            engine.add_middleware(middleware.clone());
        }
        engine
    }
}
