//! Core types for the relay workflow engine
//!
//! This crate provides the fundamental definitions shared by the runtime
//! and the standard function library: the workflow definition model, the
//! function and catalog traits, the run-scoped shared store, and
//! execution events.

mod error;
mod events;
mod function;
mod mock;
mod result;
mod store;
mod workflow;

pub use error::{CompileError, EngineError, FunctionError};
pub use events::{EventBus, ExecutionEvent, ExecutionId};
pub use function::{FunctionCatalog, FunctionContext, NodeFunction};
pub use mock::MockSpec;
pub use result::{FunctionResult, RunError};
pub use store::{MemoryLimits, SharedStore, StoreSnapshot};
pub use workflow::{
    EdgeDef, NodeDef, RetryPolicy, WorkflowDefinition, CLUSTER_OUTPUTS_KEY, DEFAULT_ACTION,
    ERROR_ACTION, PARALLEL_BATCH_FUNCTION, SEQUENTIAL_BATCH_FUNCTION,
};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
