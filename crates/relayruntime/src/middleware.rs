use async_trait::async_trait;
use relaycore::{FunctionContext, FunctionError, FunctionResult, NodeFunction};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Mutable view of the invocation a middleware chain is wrapping.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Catalog id of the function about to run.
    pub function_id: String,
    /// Id of the node that triggered the invocation.
    pub node_id: String,
    /// Params the target will receive; mutations made before delegating
    /// are visible to the rest of the chain and to the target.
    pub params: Map<String, Value>,
}

/// Cross-cutting wrapper around a single function invocation.
///
/// Chains compose onion-style: the first registered middleware wraps
/// the second, and so on down to the target function. An implementation
/// may rewrite `ctx.params` before delegating, transform the result on
/// the way back out, or short-circuit by returning without consuming
/// `next`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut InvocationContext,
        fctx: &FunctionContext,
        next: Next<'_>,
    ) -> Result<FunctionResult, FunctionError>;
}

/// Continuation for the remainder of a middleware chain.
///
/// `run` takes `self` by value, so delegating twice from the same
/// middleware does not compile.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    target: &'a Arc<dyn NodeFunction>,
}

impl<'a> Next<'a> {
    pub async fn run(
        self,
        ctx: &mut InvocationContext,
        fctx: &FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    target: self.target,
                };
                head.handle(ctx, fctx, next).await
            }
            None => self.target.call(ctx.params.clone(), fctx.clone()).await,
        }
    }
}

/// A target function with a middleware chain applied.
///
/// The engine composes one of these per invocation and calls it exactly
/// like a bare function.
pub struct Composed {
    function_id: String,
    chain: Vec<Arc<dyn Middleware>>,
    target: Arc<dyn NodeFunction>,
}

impl Composed {
    pub fn new(
        function_id: impl Into<String>,
        chain: Vec<Arc<dyn Middleware>>,
        target: Arc<dyn NodeFunction>,
    ) -> Self {
        Self {
            function_id: function_id.into(),
            chain,
            target,
        }
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub async fn invoke(
        &self,
        params: Map<String, Value>,
        fctx: FunctionContext,
    ) -> Result<FunctionResult, FunctionError> {
        let mut ctx = InvocationContext {
            function_id: self.function_id.clone(),
            node_id: fctx.node_id.clone(),
            params,
        };
        let next = Next {
            chain: &self.chain,
            target: &self.target,
        };
        next.run(&mut ctx, &fctx).await
    }
}
