//! Error types for the execution engine.

use thiserror::Error;
use wf_graph::WorkflowError;

/// Errors that can occur during workflow execution. Distinct from
/// [`wf_graph::ExecutionError`], which is the per-node failure payload
/// carried inside a [`wf_graph::NodeResult`]; this type is for failures the
/// executor itself cannot recover from or route through the error policy
/// engine.
#[derive(Error, Debug)]
pub enum ExecutionEngineError {
    #[error("graph error: {0}")]
    Graph(#[from] WorkflowError),

    #[error("node execution error in '{node}': {message}")]
    NodeExecution { node: String, message: String },

    #[error("No valid start nodes found")]
    NoStartNodes,
}

impl From<ExecutionEngineError> for wf_graph::ExecutionError {
    fn from(e: ExecutionEngineError) -> Self {
        let message = e.to_string();
        match e {
            ExecutionEngineError::NodeExecution { node, .. } => {
                wf_graph::ExecutionError::new(message).with_node(node)
            }
            _ => wf_graph::ExecutionError::new(message),
        }
    }
}
