//! Standard function library.
//!
//! Built-in catalog functions for common operations: run-log output,
//! delays, JSON transforms and HTTP fetches.

mod debug;
mod http;
mod params;
mod time;
mod transform;

pub use debug::LogFunction;
pub use http::HttpFetchFunction;
pub use time::{DelayFunction, MAX_DELAY_MS};
pub use transform::{JsonParseFunction, JsonStringifyFunction};

use relayruntime::FunctionRegistry;
use std::sync::Arc;

/// Register every standard function with a registry.
pub fn register_all(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(debug::LogFunction));
    registry.register(Arc::new(http::HttpFetchFunction::new()));
    registry.register(Arc::new(time::DelayFunction));
    registry.register(Arc::new(transform::JsonParseFunction));
    registry.register(Arc::new(transform::JsonStringifyFunction));
}
