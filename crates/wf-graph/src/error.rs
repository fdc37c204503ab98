//! Error types for the workflow graph model.

use thiserror::Error;

/// Errors raised while building or querying a [`crate::Workflow`]'s topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// A terminal, node-attributable execution failure.
///
/// Distinct from [`WorkflowError`] (which reports structural problems with
/// the graph itself): an `ExecutionError` is what the executor surfaces in
/// a [`crate::Run`] when a node's error policy resolves to `stopWorkflow`,
/// or when a node reports an error directly on its [`crate::NodeResult`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ExecutionError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            node_name: None,
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref node) = self.node_name {
            write!(f, " (node: {node})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}
