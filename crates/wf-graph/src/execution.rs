//! Execution result types: what a node returns, what a run accumulates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::Item;
use crate::error::ExecutionError;

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    #[default]
    New,
    Running,
    Waiting,
    Success,
    Canceled,
    Error,
}

impl ExecutionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Error | ExecutionStatus::Canceled
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::New => "NEW",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Waiting => "WAITING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Canceled => "CANCELED",
            ExecutionStatus::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(ExecutionStatus::New),
            "RUNNING" => Some(ExecutionStatus::Running),
            "WAITING" => Some(ExecutionStatus::Waiting),
            "SUCCESS" => Some(ExecutionStatus::Success),
            "CANCELED" => Some(ExecutionStatus::Canceled),
            "ERROR" => Some(ExecutionStatus::Error),
            _ => None,
        }
    }
}

/// The result of one node execution attempt.
///
/// `data` is indexed by output port; `data[p]` holds the items emitted on
/// port `p`. An explicit empty inner list at some port still participates
/// in downstream fan-out readiness (it extends the receiving buffer by zero
/// items); only an entirely absent `data` suppresses distribution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vec<Item>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl NodeResult {
    pub fn new(data: Vec<Vec<Item>>) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn single_port(items: Vec<Item>) -> Self {
        Self::new(vec![items])
    }

    pub fn failed(error: ExecutionError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Some(Vec::new()),
            error: None,
        }
    }
}

/// One recorded attempt of a node, with timing and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    pub start_time: i64,
    pub execution_time: i64,
    pub execution_status: ExecutionStatus,
    pub result: NodeResult,
}

impl TaskData {
    pub fn new(start_time: i64, execution_time: i64, result: NodeResult) -> Self {
        let execution_status = if result.error.is_some() {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Success
        };
        Self {
            start_time,
            execution_time,
            execution_status,
            result,
        }
    }
}

/// Accumulated per-node sequence of attempts for a run.
pub type RunData = HashMap<String, Vec<TaskData>>;

/// The top-level error reported on a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl From<ExecutionError> for RunError {
    fn from(e: ExecutionError) -> Self {
        Self {
            message: e.message,
            node_name: e.node_name,
        }
    }
}

/// The final report returned by a completed (or failed) executor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: ExecutionStatus,
    pub started_at: f64,
    pub finished_at: f64,
    pub execution_time: f64,
    pub run_data: RunData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_port_list_is_distinct_from_absent_data() {
        let with_empty_port = NodeResult::new(vec![Vec::new(), vec![HashMap::new()]]);
        assert!(with_empty_port.data.is_some());
        assert_eq!(with_empty_port.data.as_ref().unwrap()[0].len(), 0);

        let suppressed = NodeResult::failed(ExecutionError::new("boom"));
        assert!(suppressed.data.is_none());
    }

    #[test]
    fn status_round_trips_through_spec_strings() {
        for s in ["NEW", "RUNNING", "WAITING", "SUCCESS", "CANCELED", "ERROR"] {
            let status = ExecutionStatus::from_str(s).unwrap();
            assert_eq!(status.as_str(), s);
        }
    }
}
