use async_trait::async_trait;
use relaycore::{
    EngineError, ExecutionEvent, FunctionContext, FunctionError, FunctionResult, NodeDef,
    WorkflowDefinition,
};
use relayruntime::{
    load_definition, parse_definition, FunctionRegistry, InvocationContext, Middleware, Next,
    RelayRuntime, RunOptions, RuntimeConfig,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn echo_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register_fn("echo", |params, _ctx| async move {
        let message = params.get("message").cloned().unwrap_or(Value::Null);
        Ok(FunctionResult::ok(message))
    });
    registry.register_fn("double", |params, _ctx| async move {
        let n = params.get("currentItem").and_then(Value::as_i64).unwrap_or(0);
        Ok(FunctionResult::ok(json!(n * 2)))
    });
    registry
}

#[tokio::test]
async fn test_runtime_compiles_and_runs_a_definition() {
    let mut def = WorkflowDefinition::new("a");
    def.add_node(NodeDef::new("a", "echo").with_param("message", "one"));
    def.add_node(NodeDef::new("b", "echo").with_param("message", "two"));
    def.connect("a", "default", "b");

    let runtime = RelayRuntime::new(Arc::new(echo_registry()));
    let report = runtime.run(&def, RunOptions::new()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.steps, 2);
}

#[tokio::test]
async fn test_runtime_surfaces_compile_errors() {
    let mut def = WorkflowDefinition::new("a");
    def.add_node(NodeDef::new("a", "echo"));
    def.connect("a", "default", "ghost");

    let runtime = RelayRuntime::new(Arc::new(echo_registry()));
    let err = runtime.run(&def, RunOptions::new()).await.unwrap_err();

    match err {
        EngineError::Compile(errors) => assert_eq!(errors.len(), 1),
        other => panic!("expected a compile error, got: {}", other),
    }
}

#[tokio::test]
async fn test_runtime_shares_one_event_bus_across_runs() {
    let mut def = WorkflowDefinition::new("a");
    def.add_node(NodeDef::new("a", "echo"));

    let runtime = RelayRuntime::new(Arc::new(echo_registry()));
    let mut rx = runtime.subscribe_events();

    runtime.run(&def, RunOptions::new()).await.unwrap();
    runtime.run(&def, RunOptions::new()).await.unwrap();

    let mut completed = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ExecutionEvent::WorkflowCompleted { .. }) {
            completed += 1;
        }
    }
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn test_runtime_applies_configured_iteration_cap() {
    let mut def = WorkflowDefinition::new("loop");
    def.add_node(NodeDef::new("loop", "echo"));
    def.connect("loop", "default", "loop");

    let runtime = RelayRuntime::with_config(
        Arc::new(echo_registry()),
        RuntimeConfig {
            max_iterations: 3,
            ..RuntimeConfig::default()
        },
    );
    let report = runtime.run(&def, RunOptions::new()).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.steps, 3);
}

struct CountInvocations {
    count: Arc<AtomicU32>,
}

#[async_trait]
impl Middleware for CountInvocations {
    async fn handle(
        &self,
        ctx: &mut InvocationContext,
        fctx: &FunctionContext,
        next: Next<'_>,
    ) -> Result<FunctionResult, FunctionError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        next.run(ctx, fctx).await
    }
}

#[tokio::test]
async fn test_runtime_middleware_wraps_every_function_invocation() {
    let count = Arc::new(AtomicU32::new(0));
    let mut runtime = RelayRuntime::new(Arc::new(echo_registry()));
    runtime.add_middleware(Arc::new(CountInvocations { count: count.clone() }));

    let mut def = WorkflowDefinition::new("batch");
    def.add_node(
        NodeDef::new("batch", "batch.sequential")
            .with_param("array", json!([1, 2, 3]))
            .with_param("processorFunction", "double"),
    );
    def.add_node(NodeDef::new("tail", "echo"));
    def.connect("batch", "default", "tail");

    let report = runtime.run(&def, RunOptions::new()).await.unwrap();

    assert!(report.success);
    assert_eq!(
        count.load(Ordering::SeqCst),
        4,
        "three batch items plus the tail node"
    );
}

#[test]
fn test_parse_definition_applies_field_defaults() {
    let def = parse_definition(
        r#"{
            "start_node_id": "only",
            "nodes": [{ "id": "only", "function_id": "echo" }]
        }"#,
    )
    .unwrap();

    assert_eq!(def.start_node_id, "only");
    assert!(def.name.is_none());
    assert!(def.edges.is_empty());
    assert_eq!(def.nodes[0].retry.max_retries, 1);
}

#[test]
fn test_parse_definition_rejects_malformed_json() {
    let err = parse_definition("{ this is not json").unwrap_err();
    assert!(matches!(err, EngineError::Serialization(_)));
}

#[tokio::test]
async fn test_load_definition_reads_a_fixture_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pipeline.json");
    let def = load_definition(&path).unwrap();

    assert_eq!(def.name.as_deref(), Some("fixture-pipeline"));
    assert_eq!(def.nodes.len(), 2);
    assert_eq!(def.nodes[1].retry.max_retries, 2);
    assert_eq!(def.env.get("STAGE").map(String::as_str), Some("fixture"));

    let runtime = RelayRuntime::new(Arc::new(echo_registry()));
    let report = runtime.run(&def, RunOptions::new()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.node_result("transform").unwrap().output, json!("transformed"));
}

#[test]
fn test_load_definition_missing_file_is_an_io_error() {
    let err = load_definition("does/not/exist.json").unwrap_err();
    assert!(matches!(err, EngineError::Io(_)));
}
