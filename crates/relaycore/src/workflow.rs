use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Routing label used when a result carries no explicit action, and the
/// fallback label consulted when no edge matches the result's action.
pub const DEFAULT_ACTION: &str = "default";

/// Routing label conventionally used to branch around partial failure
/// (batch nodes emit it when one or more items fail).
pub const ERROR_ACTION: &str = "error";

/// Reserved function id marking a node as a sequential batch orchestrator
pub const SEQUENTIAL_BATCH_FUNCTION: &str = "batch.sequential";

/// Reserved function id marking a node as a parallel batch orchestrator
pub const PARALLEL_BATCH_FUNCTION: &str = "batch.parallel";

/// Store key under which cluster fan-out outputs are collected, keyed by
/// root node id
pub const CLUSTER_OUTPUTS_KEY: &str = "_clusterOutputs";

/// Complete workflow definition as authored in JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub start_node_id: String,
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    /// Workflow-level environment, overridden per node and overriding
    /// run-level values
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl WorkflowDefinition {
    pub fn new(start_node_id: impl Into<String>) -> Self {
        Self {
            name: None,
            start_node_id: start_node_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn add_node(&mut self, node: NodeDef) {
        self.nodes.push(node);
    }

    /// Add an edge `source --action--> target`
    pub fn connect(
        &mut self,
        source: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) {
        self.edges.push(EdgeDef {
            source: source.into(),
            target: target.into(),
            action: action.into(),
            sub_edge: false,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One unit of work in a workflow, referencing a catalog function by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    pub function_id: String,
    /// Opaque key-value params handed to the function
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Node-level environment overrides (win over workflow and run level)
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Marks this node as the root of a cluster fan-out
    #[serde(default)]
    pub cluster_root: bool,
    /// Marks this node as owned by a cluster root; it never enters the
    /// main traversal
    #[serde(default)]
    pub sub_node: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl NodeDef {
    pub fn new(id: impl Into<String>, function_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function_id: function_id.into(),
            params: Map::new(),
            env: HashMap::new(),
            retry: RetryPolicy::default(),
            cluster_root: false,
            sub_node: false,
            parent_id: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            retry_delay_ms,
        };
        self
    }

    pub fn as_cluster_root(mut self) -> Self {
        self.cluster_root = true;
        self
    }

    pub fn as_sub_node_of(mut self, parent_id: impl Into<String>) -> Self {
        self.sub_node = true;
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Directed connection active when the source node's result carries the
/// matching action label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub source: String,
    pub target: String,
    #[serde(default = "default_action")]
    pub action: String,
    /// Cluster-internal edge; removed from the main adjacency at compile
    /// time
    #[serde(default)]
    pub sub_edge: bool,
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

impl EdgeDef {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            action: default_action(),
            sub_edge: false,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

/// Retry policy for a regular node's function invocation.
///
/// `max_retries` is the TOTAL attempt count. Only errors raised by the
/// function (the exception channel) are retried; an explicit
/// `success: false` result is fatal on first occurrence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Total attempts to make; a configured 0 still runs the node once
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}
