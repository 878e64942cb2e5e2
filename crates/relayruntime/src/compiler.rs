use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use relaycore::{
    CompileError, NodeDef, WorkflowDefinition, DEFAULT_ACTION, PARALLEL_BATCH_FUNCTION,
    SEQUENTIAL_BATCH_FUNCTION,
};
use std::collections::{HashMap, HashSet};

/// How the engine executes a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Regular,
    SequentialBatch,
    ParallelBatch,
    ClusterRoot,
}

/// A node prepared for traversal.
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub def: NodeDef,
    pub strategy: Strategy,
    /// Sub-nodes absorbed into this cluster root; empty for every other
    /// strategy.
    pub sub_nodes: Vec<NodeDef>,
}

/// Action-labeled transition between two main-graph nodes.
///
/// `order` records the position of the edge in the definition so that
/// routing stays deterministic when several edges leave the same node.
#[derive(Debug, Clone)]
pub struct ActionEdge {
    pub action: String,
    pub order: usize,
}

/// Executable form of a workflow definition.
#[derive(Debug)]
pub struct CompiledWorkflow {
    pub name: Option<String>,
    pub start_node_id: String,
    pub env: HashMap<String, String>,
    graph: StableDiGraph<CompiledNode, ActionEdge>,
    index: HashMap<String, NodeIndex>,
}

impl CompiledWorkflow {
    pub fn node(&self, id: &str) -> Option<&CompiledNode> {
        self.index.get(id).map(|ix| &self.graph[*ix])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Pick the next node id for an action.
    ///
    /// Edges are considered in definition order: the first edge whose
    /// action matches exactly wins, otherwise the first `default` edge,
    /// otherwise `None` and the traversal halts cleanly.
    pub fn route(&self, from: &str, action: &str) -> Option<String> {
        let ix = self.index.get(from)?;
        let mut edges: Vec<(&ActionEdge, NodeIndex)> = self
            .graph
            .edges(*ix)
            .map(|edge| (edge.weight(), edge.target()))
            .collect();
        edges.sort_by_key(|(weight, _)| weight.order);

        edges
            .iter()
            .find(|(weight, _)| weight.action == action)
            .or_else(|| edges.iter().find(|(weight, _)| weight.action == DEFAULT_ACTION))
            .map(|(_, target)| self.graph[*target].def.id.clone())
    }
}

/// Compile a definition into an executable graph.
///
/// Validation collects every structural problem instead of stopping at
/// the first, so a caller can report them all at once.
pub fn compile(def: &WorkflowDefinition) -> Result<CompiledWorkflow, Vec<CompileError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for node in &def.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(CompileError::DuplicateNodeId(node.id.clone()));
        }
    }

    let main_nodes: Vec<&NodeDef> = def.nodes.iter().filter(|n| !n.sub_node).collect();
    let main_by_id: HashMap<&str, &NodeDef> =
        main_nodes.iter().map(|n| (n.id.as_str(), *n)).collect();
    let all_ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();

    if !main_by_id.contains_key(def.start_node_id.as_str()) {
        errors.push(CompileError::StartNodeNotFound(def.start_node_id.clone()));
    }

    // Sub-nodes leave the main graph and attach to their cluster root.
    let mut children: HashMap<String, Vec<NodeDef>> = HashMap::new();
    for sub in def.nodes.iter().filter(|n| n.sub_node) {
        match &sub.parent_id {
            None => errors.push(CompileError::MissingParentId(sub.id.clone())),
            Some(parent_id) => match main_by_id.get(parent_id.as_str()) {
                None => errors.push(CompileError::UnknownParent {
                    node: sub.id.clone(),
                    parent: parent_id.clone(),
                }),
                Some(parent) if !parent.cluster_root => {
                    errors.push(CompileError::ParentNotClusterRoot {
                        node: sub.id.clone(),
                        parent: parent_id.clone(),
                    });
                }
                Some(_) => {
                    children.entry(parent_id.clone()).or_default().push(sub.clone());
                }
            },
        }
    }

    for edge in &def.edges {
        if edge.sub_edge {
            // Sub-edges are validated and then dropped: fan-out order
            // inside a cluster comes from sub-node declaration order.
            if !all_ids.contains(edge.source.as_str()) {
                errors.push(CompileError::UnknownEdgeSource(edge.source.clone()));
            }
            if !all_ids.contains(edge.target.as_str()) {
                errors.push(CompileError::UnknownEdgeTarget(edge.target.clone()));
            }
        } else {
            if !main_by_id.contains_key(edge.source.as_str()) {
                errors.push(CompileError::UnknownEdgeSource(edge.source.clone()));
            }
            if !main_by_id.contains_key(edge.target.as_str()) {
                errors.push(CompileError::UnknownEdgeTarget(edge.target.clone()));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut graph = StableDiGraph::new();
    let mut index = HashMap::new();
    for node in &main_nodes {
        let strategy = classify(node);
        let sub_nodes = children.remove(node.id.as_str()).unwrap_or_default();
        let ix = graph.add_node(CompiledNode {
            def: (*node).clone(),
            strategy,
            sub_nodes,
        });
        index.insert(node.id.clone(), ix);
    }

    for (order, edge) in def.edges.iter().filter(|e| !e.sub_edge).enumerate() {
        let source = index[edge.source.as_str()];
        let target = index[edge.target.as_str()];
        graph.add_edge(
            source,
            target,
            ActionEdge {
                action: edge.action.clone(),
                order,
            },
        );
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        start = %def.start_node_id,
        "compiled workflow"
    );

    Ok(CompiledWorkflow {
        name: def.name.clone(),
        start_node_id: def.start_node_id.clone(),
        env: def.env.clone(),
        graph,
        index,
    })
}

fn classify(node: &NodeDef) -> Strategy {
    if node.cluster_root {
        Strategy::ClusterRoot
    } else if node.function_id == SEQUENTIAL_BATCH_FUNCTION {
        Strategy::SequentialBatch
    } else if node.function_id == PARALLEL_BATCH_FUNCTION {
        Strategy::ParallelBatch
    } else {
        Strategy::Regular
    }
}
