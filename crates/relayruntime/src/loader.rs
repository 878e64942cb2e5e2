use relaycore::{EngineError, WorkflowDefinition};
use std::path::Path;

/// Read a workflow definition from a JSON file.
pub fn load_definition(path: impl AsRef<Path>) -> Result<WorkflowDefinition, EngineError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading workflow definition");
    let raw = std::fs::read_to_string(path)?;
    parse_definition(&raw)
}

/// Parse a workflow definition from JSON text.
pub fn parse_definition(raw: &str) -> Result<WorkflowDefinition, EngineError> {
    let definition = serde_json::from_str(raw)?;
    Ok(definition)
}
