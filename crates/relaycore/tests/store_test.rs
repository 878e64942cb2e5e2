use relaycore::{FunctionResult, MemoryLimits, MockSpec, RunError, SharedStore};
use serde_json::json;
use std::collections::HashMap;

fn limits(max_logs: usize, max_node_results: usize) -> MemoryLimits {
    MemoryLimits {
        max_logs,
        max_node_results,
        ..MemoryLimits::default()
    }
}

#[tokio::test]
async fn test_log_lines_are_timestamped_and_prefixed() {
    let store = SharedStore::new();
    store.log("node-a", "hello").await;

    let logs = store.logs().await;
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with('['), "line should start with a timestamp");
    assert!(logs[0].contains("[node-a] hello"));
}

#[tokio::test]
async fn test_clone_shares_state() {
    let store = SharedStore::new();
    let handle = store.clone();

    handle.set("k", json!(5)).await;

    assert_eq!(store.get("k").await, Some(json!(5)));
}

#[tokio::test]
async fn test_remove_takes_value_out_of_data() {
    let store = SharedStore::new();
    store.set("k", json!(1)).await;

    assert_eq!(store.remove("k").await, Some(json!(1)));
    assert_eq!(store.get("k").await, None);
    assert_eq!(store.remove("k").await, None);
}

#[tokio::test]
async fn test_log_count_tracks_appends() {
    let store = SharedStore::new();
    assert_eq!(store.log_count().await, 0);

    store.log("n", "one").await;
    store.log("n", "two").await;

    assert_eq!(store.log_count().await, 2);
}

#[tokio::test]
async fn test_log_cap_keeps_newest_plus_marker() {
    let store = SharedStore::new();
    for i in 0..25 {
        store.log("n", &format!("line {}", i)).await;
    }

    store.enforce_limits(&limits(10, 100)).await;

    let logs = store.logs().await;
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0], "[SYSTEM] truncated 16 entries");
    assert!(logs[1].contains("line 16"), "oldest surviving entry");
    assert!(logs[9].contains("line 24"), "newest entry kept");
}

#[tokio::test]
async fn test_log_cap_marker_is_cumulative() {
    let store = SharedStore::new();
    for i in 0..25 {
        store.log("n", &format!("line {}", i)).await;
    }
    store.enforce_limits(&limits(10, 100)).await;

    for i in 25..30 {
        store.log("n", &format!("line {}", i)).await;
    }
    store.enforce_limits(&limits(10, 100)).await;

    let logs = store.logs().await;
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0], "[SYSTEM] truncated 21 entries");
    assert!(logs[1].contains("line 21"));
    assert!(logs[9].contains("line 29"));
}

#[tokio::test]
async fn test_logs_exactly_at_cap_are_untouched() {
    let store = SharedStore::new();
    for i in 0..10 {
        store.log("n", &format!("line {}", i)).await;
    }

    store.enforce_limits(&limits(10, 100)).await;

    let logs = store.logs().await;
    assert_eq!(logs.len(), 10);
    assert!(
        !logs[0].contains("[SYSTEM]"),
        "no marker when nothing was trimmed"
    );
}

#[tokio::test]
async fn test_node_results_evict_oldest_first() {
    let store = SharedStore::new();
    for id in ["a", "b", "c", "d", "e"] {
        store.record_result(id, FunctionResult::ok(json!(1))).await;
    }

    store.enforce_limits(&limits(100, 3)).await;

    assert_eq!(store.result_count().await, 3);
    assert!(store.node_result("a").await.is_none());
    assert!(store.node_result("b").await.is_none());
    assert!(store.node_result("c").await.is_some());
    assert!(store.node_result("e").await.is_some());
}

#[tokio::test]
async fn test_rerecording_keeps_original_eviction_slot() {
    let store = SharedStore::new();
    store.record_result("a", FunctionResult::ok(json!(1))).await;
    store.record_result("b", FunctionResult::ok(json!(2))).await;
    store.record_result("a", FunctionResult::ok(json!(3))).await;
    store.record_result("c", FunctionResult::ok(json!(4))).await;

    store.enforce_limits(&limits(100, 2)).await;

    // "a" stays the oldest entry despite the overwrite
    assert!(store.node_result("a").await.is_none());
    assert_eq!(store.node_result("b").await.unwrap().output, json!(2));
    assert_eq!(store.node_result("c").await.unwrap().output, json!(4));
}

#[tokio::test]
async fn test_data_size_warning_logged_once_and_never_truncates() {
    let store = SharedStore::new();
    let limits = MemoryLimits {
        max_data_bytes: 16,
        ..MemoryLimits::default()
    };
    store
        .set("blob", json!("0123456789abcdef0123456789abcdef"))
        .await;

    store.enforce_limits(&limits).await;
    store.enforce_limits(&limits).await;

    let logs = store.logs().await;
    let warnings = logs.iter().filter(|l| l.contains("data size")).count();
    assert_eq!(warnings, 1, "warning fires once per run");
    assert!(store.get("blob").await.is_some(), "data is never truncated");
}

#[tokio::test]
async fn test_mock_lookup_skips_disabled() {
    let mut mocks = HashMap::new();
    mocks.insert("off".to_string(), MockSpec::returning(json!(1)).disabled());
    mocks.insert("on".to_string(), MockSpec::returning(json!(2)));
    let store = SharedStore::for_run(serde_json::Map::new(), HashMap::new(), mocks);

    assert!(store.mock_for("off").await.is_none());
    assert_eq!(store.mock_for("on").await.unwrap().output, json!(2));
    assert!(store.mock_for("missing").await.is_none());
}

#[tokio::test]
async fn test_snapshot_carries_partial_progress() {
    let store = SharedStore::new();
    store.set("k", json!("v")).await;
    store.log("n1", "ran").await;
    store.record_result("n1", FunctionResult::ok(json!(1))).await;
    store.set_last_error(RunError::at_node("n1", "boom")).await;

    let snapshot = store.snapshot().await;

    assert_eq!(snapshot.data.get("k"), Some(&json!("v")));
    assert_eq!(snapshot.logs.len(), 1);
    assert!(snapshot.node_results.contains_key("n1"));
    let err = snapshot.last_error.unwrap();
    assert_eq!(err.node_id.as_deref(), Some("n1"));
    assert_eq!(err.message, "boom");
}
