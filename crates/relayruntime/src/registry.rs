use async_trait::async_trait;
use relaycore::{FunctionCatalog, FunctionContext, FunctionError, FunctionResult, NodeFunction};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// In-memory function catalog.
///
/// Registration happens up front; the registry is then wrapped in an
/// `Arc` and shared read-only with the engine.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn NodeFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function under its own id. The last registration for an
    /// id wins.
    pub fn register(&mut self, function: Arc<dyn NodeFunction>) {
        let function_id = function.function_id().to_string();
        tracing::info!("Registering function: {}", function_id);
        self.functions.insert(function_id, function);
    }

    /// Register an async closure under an explicit id.
    pub fn register_fn<F, Fut>(&mut self, function_id: impl Into<String>, f: F)
    where
        F: Fn(Map<String, Value>, FunctionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FunctionResult, FunctionError>> + Send + 'static,
    {
        self.register(Arc::new(FnFunction {
            function_id: function_id.into(),
            f,
        }));
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionCatalog for FunctionRegistry {
    fn has(&self, function_id: &str) -> bool {
        self.functions.contains_key(function_id)
    }

    fn resolve(&self, function_id: &str) -> Option<Arc<dyn NodeFunction>> {
        self.functions.get(function_id).cloned()
    }

    fn function_ids(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

struct FnFunction<F> {
    function_id: String,
    f: F,
}

#[async_trait]
impl<F, Fut> NodeFunction for FnFunction<F>
where
    F: Fn(Map<String, Value>, FunctionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FunctionResult, FunctionError>> + Send + 'static,
{
    fn function_id(&self) -> &str {
        &self.function_id
    }

    async fn call(
        &self,
        params: Map<String, Value>,
        ctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        (self.f)(params, ctx).await
    }
}
