//! Workflow compilation and execution runtime.
//!
//! Compiles workflow definitions into action-routed graphs and walks
//! them to a terminal state: strategy dispatch, retry policies, batch
//! and cluster fan-out, middleware composition, mock substitution and
//! per-run memory governance.

mod compiler;
mod engine;
mod loader;
mod middleware;
mod profiler;
mod registry;
mod runtime;

pub use compiler::{compile, ActionEdge, CompiledNode, CompiledWorkflow, Strategy};
pub use engine::{DebugHooks, Engine, EngineConfig, RunOptions, RunReport};
pub use loader::{load_definition, parse_definition};
pub use middleware::{Composed, InvocationContext, Middleware, Next};
pub use profiler::{NodeProfile, NodeProfiler, ProfileSample};
pub use registry::FunctionRegistry;
pub use runtime::{RelayRuntime, RuntimeConfig};
