//! Workflow definition: nodes, connections, and graph-level lookups.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::connection::{WorkflowConnections, CONNECTION_MAIN};
use crate::data::DataObject;
use crate::error::WorkflowError;
use crate::node::Node;

/// A run's execution mode. String-valued per the specification: the engine
/// special-cases only [`ExecutionMode::MANUAL`] (trigger behavior); every
/// other value is opaque and passed through to nodes unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ExecutionMode(pub String);

impl ExecutionMode {
    pub const MANUAL: &'static str = "manual";

    pub fn manual() -> Self {
        Self(Self::MANUAL.to_string())
    }

    pub fn is_manual(&self) -> bool {
        self.0 == Self::MANUAL
    }
}

impl From<&str> for ExecutionMode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExecutionMode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow-level settings that influence a run but are not part of its
/// topology.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<u64>,
}

/// A workflow definition: its nodes and the connections between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    pub nodes: Vec<Node>,
    #[serde(rename = "connections")]
    pub connections_by_source: WorkflowConnections,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<DataObject>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: false,
            nodes: Vec::new(),
            connections_by_source: WorkflowConnections::new(),
            settings: WorkflowSettings::default(),
            static_data: None,
        }
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Add a `main` connection from `source`'s output port `source_index`
    /// to `target`'s input port `target_index`, growing the source's output
    /// port list as needed.
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        source_index: usize,
        target_index: usize,
    ) -> Result<(), WorkflowError> {
        if self.get_node(source).is_none() {
            return Err(WorkflowError::NodeNotFound(source.to_string()));
        }
        if self.get_node(target).is_none() {
            return Err(WorkflowError::NodeNotFound(target.to_string()));
        }

        let conn = crate::connection::Connection::main(target, target_index);

        let by_index = self
            .connections_by_source
            .entry(source.to_string())
            .or_default()
            .entry(CONNECTION_MAIN.to_string())
            .or_default();

        while by_index.len() <= source_index {
            by_index.push(Vec::new());
        }
        by_index[source_index].push(conn);

        Ok(())
    }

    /// Nodes whose type name implies a trigger, per §4.1's textual rule.
    /// This does not consult `NodeType.is_trigger` — that requires the
    /// dispatcher and is combined with this at the executor's start-node
    /// selection step.
    pub fn get_trigger_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.type_name_implies_trigger())
            .collect()
    }

    /// Nodes with no incoming `main` connection.
    pub fn rootless_nodes(&self) -> Vec<&Node> {
        let by_dest = crate::connection::graph::map_connections_by_destination(
            &self.connections_by_source,
        );
        self.nodes
            .iter()
            .filter(|n| {
                by_dest
                    .get(&n.name)
                    .map(|sources| {
                        !sources
                            .iter()
                            .any(|s| s.connection_type == CONNECTION_MAIN)
                    })
                    .unwrap_or(true)
            })
            .collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Structural validation: non-empty, unique names, connections reference
    /// existing nodes, and the `main` graph is acyclic.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.nodes.is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "workflow has no nodes".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(&node.name) {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "duplicate node name: {}",
                    node.name
                )));
            }
        }

        for (source, node_conns) in &self.connections_by_source {
            if self.get_node(source).is_none() {
                return Err(WorkflowError::NodeNotFound(source.clone()));
            }
            for by_index in node_conns.values() {
                for connections_at_index in by_index {
                    for conn in connections_at_index {
                        if self.get_node(&conn.node).is_none() {
                            return Err(WorkflowError::NodeNotFound(conn.node.clone()));
                        }
                    }
                }
            }
        }

        let all_names: Vec<_> = self.nodes.iter().map(|n| n.name.clone()).collect();
        crate::connection::graph::topological_sort(&all_names, &self.connections_by_source)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rootless_nodes_excludes_connected_targets() {
        let mut wf = Workflow::new("wf1", "test");
        wf.add_node(Node::new("A", "producer"));
        wf.add_node(Node::new("B", "producer"));
        wf.connect("A", "B", 0, 0).unwrap();

        let roots: Vec<_> = wf.rootless_nodes().into_iter().map(|n| n.name.clone()).collect();
        assert_eq!(roots, vec!["A".to_string()]);
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut wf = Workflow::new("wf1", "test");
        wf.add_node(Node::new("A", "producer"));
        wf.add_node(Node::new("A", "producer"));
        assert!(wf.validate().is_err());
    }

    #[test]
    fn execution_mode_manual_is_recognized_others_are_opaque() {
        assert!(ExecutionMode::manual().is_manual());
        assert!(!ExecutionMode::from("webhook").is_manual());
    }
}
