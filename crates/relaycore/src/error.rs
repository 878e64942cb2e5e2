use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    #[error("Workflow failed to compile with {} error(s)", .0.len())]
    Compile(Vec<CompileError>),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum FunctionError {
    #[error("Missing required param: {0}")]
    MissingParam(String),

    #[error("Invalid param type for '{field}': expected {expected}, got {actual}")]
    InvalidParamType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Start node not found: {0}")]
    StartNodeNotFound(String),

    #[error("Edge source references unknown node: {0}")]
    UnknownEdgeSource(String),

    #[error("Edge target references unknown node: {0}")]
    UnknownEdgeTarget(String),

    #[error("Sub-node '{0}' declares no parent id")]
    MissingParentId(String),

    #[error("Sub-node '{node}' references unknown parent: {parent}")]
    UnknownParent { node: String, parent: String },

    #[error("Parent '{parent}' of sub-node '{node}' is not a cluster root")]
    ParentNotClusterRoot { node: String, parent: String },
}
