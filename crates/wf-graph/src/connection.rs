//! Connection types and graph traversal utilities.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connection type identifier. Only [`CONNECTION_MAIN`] participates in
/// execution data flow; the others are recognized-but-inert sidecar wires.
pub type ConnectionType = String;

pub const CONNECTION_MAIN: &str = "main";
pub const CONNECTION_AI_TOOL: &str = "ai_tool";
pub const CONNECTION_AI_LANGUAGE_MODEL: &str = "ai_languageModel";
pub const CONNECTION_AI_MEMORY: &str = "ai_memory";
pub const CONNECTION_AI_OUTPUT_PARSER: &str = "ai_outputParser";

/// A source-side connection record: "my output port `index` feeds `node`'s
/// input port `index` under `connection_type`".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    /// Destination node name.
    pub node: String,
    /// Connection type.
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    /// Destination port index.
    pub index: usize,
}

impl Connection {
    pub fn new(node: impl Into<String>, connection_type: impl Into<String>, index: usize) -> Self {
        Self {
            node: node.into(),
            connection_type: connection_type.into(),
            index,
        }
    }

    pub fn main(node: impl Into<String>, index: usize) -> Self {
        Self::new(node, CONNECTION_MAIN, index)
    }
}

/// Connections from a single output port, indexed by output port: `[outputIndex] -> [connections]`.
pub type ConnectionsByIndex = Vec<Vec<Connection>>;

/// All connections leaving one node, indexed by connection type.
pub type NodeConnections = HashMap<ConnectionType, ConnectionsByIndex>;

/// All workflow connections, indexed by source node name.
pub type WorkflowConnections = HashMap<String, NodeConnections>;

/// The destination-indexed inverse of [`WorkflowConnections`], built by
/// [`graph::map_connections_by_destination`].
pub type ConnectionsByDestination = HashMap<String, Vec<ConnectionSource>>;

/// One inbound edge, as seen from the destination side.
#[derive(Debug, Clone)]
pub struct ConnectionSource {
    pub source_node: String,
    pub connection_type: ConnectionType,
    pub source_index: usize,
    pub dest_index: usize,
}

/// Graph traversal and indexing utilities over [`WorkflowConnections`].
pub mod graph {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    /// Build the destination-indexed inverse of a source-indexed connection
    /// table, growing each destination port's slot list on demand.
    pub fn map_connections_by_destination(
        connections: &WorkflowConnections,
    ) -> ConnectionsByDestination {
        let mut result: ConnectionsByDestination = HashMap::new();

        for (source_node, node_connections) in connections {
            for (connection_type, by_index) in node_connections {
                for (source_index, connections_at_index) in by_index.iter().enumerate() {
                    for conn in connections_at_index {
                        result
                            .entry(conn.node.clone())
                            .or_default()
                            .push(ConnectionSource {
                                source_node: source_node.clone(),
                                connection_type: connection_type.clone(),
                                source_index,
                                dest_index: conn.index,
                            });
                    }
                }
            }
        }

        result
    }

    /// Compute, for every node appearing as a destination, the count of
    /// *distinct* destination port indices fed by `main` connections.
    pub fn calculate_input_requirements(
        connections_by_dest: &ConnectionsByDestination,
    ) -> HashMap<String, usize> {
        let mut result = HashMap::new();
        for (dest, sources) in connections_by_dest {
            let mut ports: HashSet<usize> = HashSet::new();
            for source in sources {
                if source.connection_type == CONNECTION_MAIN {
                    ports.insert(source.dest_index);
                }
            }
            if !ports.is_empty() {
                result.insert(dest.clone(), ports.len());
            }
        }
        result
    }

    /// Breadth-first child (successor) traversal.
    pub fn get_child_nodes_bfs(
        connections: &WorkflowConnections,
        node_name: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        queue.push_back((node_name.to_string(), 0usize));
        visited.insert(node_name.to_string());

        while let Some((current_node, current_depth)) = queue.pop_front() {
            if let Some(max_depth) = depth {
                if current_depth >= max_depth {
                    continue;
                }
            }
            for next in direct_children(connections, &current_node, connection_type) {
                if visited.insert(next.clone()) {
                    result.push(next.clone());
                    queue.push_back((next, current_depth + 1));
                }
            }
        }

        result
    }

    /// Depth-first child (successor) traversal. Same reachable set as the
    /// BFS variant; differs only in visitation order.
    pub fn get_child_nodes_dfs(
        connections: &WorkflowConnections,
        node_name: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(node_name.to_string());
        dfs_children(connections, node_name, connection_type, depth, 0, &mut visited, &mut result);
        result
    }

    fn dfs_children(
        connections: &WorkflowConnections,
        current: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
        current_depth: usize,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if let Some(max_depth) = depth {
            if current_depth >= max_depth {
                return;
            }
        }
        for next in direct_children(connections, current, connection_type) {
            if visited.insert(next.clone()) {
                result.push(next.clone());
                dfs_children(connections, &next, connection_type, depth, current_depth + 1, visited, result);
            }
        }
    }

    fn direct_children(
        connections: &WorkflowConnections,
        node_name: &str,
        connection_type: Option<&str>,
    ) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(node_conns) = connections.get(node_name) {
            for (conn_type, by_index) in node_conns {
                if let Some(filter_type) = connection_type {
                    if conn_type != filter_type {
                        continue;
                    }
                }
                for connections_at_index in by_index {
                    for conn in connections_at_index {
                        out.push(conn.node.clone());
                    }
                }
            }
        }
        out
    }

    /// Breadth-first parent (predecessor) traversal over the destination index.
    pub fn get_parent_nodes_bfs(
        connections_by_dest: &ConnectionsByDestination,
        node_name: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        queue.push_back((node_name.to_string(), 0usize));
        visited.insert(node_name.to_string());

        while let Some((current_node, current_depth)) = queue.pop_front() {
            if let Some(max_depth) = depth {
                if current_depth >= max_depth {
                    continue;
                }
            }
            for parent in direct_parents(connections_by_dest, &current_node, connection_type) {
                if visited.insert(parent.clone()) {
                    result.push(parent.clone());
                    queue.push_back((parent, current_depth + 1));
                }
            }
        }

        result
    }

    /// Depth-first parent (predecessor) traversal. Same reachable set as
    /// the BFS variant; differs only in visitation order.
    pub fn get_parent_nodes_dfs(
        connections_by_dest: &ConnectionsByDestination,
        node_name: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(node_name.to_string());
        dfs_parents(connections_by_dest, node_name, connection_type, depth, 0, &mut visited, &mut result);
        result
    }

    fn dfs_parents(
        connections_by_dest: &ConnectionsByDestination,
        current: &str,
        connection_type: Option<&str>,
        depth: Option<usize>,
        current_depth: usize,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if let Some(max_depth) = depth {
            if current_depth >= max_depth {
                return;
            }
        }
        for parent in direct_parents(connections_by_dest, current, connection_type) {
            if visited.insert(parent.clone()) {
                result.push(parent.clone());
                dfs_parents(connections_by_dest, &parent, connection_type, depth, current_depth + 1, visited, result);
            }
        }
    }

    fn direct_parents(
        connections_by_dest: &ConnectionsByDestination,
        node_name: &str,
        connection_type: Option<&str>,
    ) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(sources) = connections_by_dest.get(node_name) {
            for source in sources {
                if let Some(filter_type) = connection_type {
                    if source.connection_type != filter_type {
                        continue;
                    }
                }
                out.push(source.source_node.clone());
            }
        }
        out
    }

    /// Union of parents and children (both directions), deduplicated.
    pub fn get_connected_nodes(
        connections: &WorkflowConnections,
        connections_by_dest: &ConnectionsByDestination,
        node_name: &str,
    ) -> Vec<String> {
        let mut result: HashSet<String> = HashSet::new();
        result.extend(get_child_nodes_bfs(connections, node_name, None, None));
        result.extend(get_parent_nodes_bfs(connections_by_dest, node_name, None, None));
        result.into_iter().collect()
    }

    /// The ancestor set of `destination`, inclusive of `destination` itself —
    /// the sub-graph used to prune execution when a destination node is given.
    pub fn ancestors_including(
        connections_by_dest: &ConnectionsByDestination,
        destination: &str,
    ) -> HashSet<String> {
        let mut result: HashSet<String> = HashSet::new();
        result.insert(destination.to_string());
        for ancestor in get_parent_nodes_dfs(connections_by_dest, destination, Some(CONNECTION_MAIN), None) {
            result.insert(ancestor);
        }
        result
    }

    /// Recursion state for [`topological_sort`]'s depth-first walk:
    /// `Visiting` marks a node still on the current recursion path (seeing
    /// it again means a cycle); `Done` marks one fully resolved.
    enum VisitMark {
        Visiting,
        Done,
    }

    /// Depth-first visit used by [`topological_sort`]: walks `name`'s `main`
    /// successors first, then appends `name` itself, producing a *reverse*
    /// topological order in `order` (the caller reverses it once at the end).
    /// Returns `Err(())` the moment a node still `Visiting` is reached again.
    fn visit_for_topological_sort(
        name: &str,
        connections: &WorkflowConnections,
        node_set: &HashSet<String>,
        marks: &mut HashMap<String, VisitMark>,
        order: &mut Vec<String>,
    ) -> Result<(), ()> {
        match marks.get(name) {
            Some(VisitMark::Done) => return Ok(()),
            Some(VisitMark::Visiting) => return Err(()),
            None => {}
        }

        marks.insert(name.to_string(), VisitMark::Visiting);

        if let Some(node_conns) = connections.get(name) {
            if let Some(by_index) = node_conns.get(CONNECTION_MAIN) {
                for connections_at_index in by_index {
                    for conn in connections_at_index {
                        if node_set.contains(&conn.node) {
                            visit_for_topological_sort(&conn.node, connections, node_set, marks, order)?;
                        }
                    }
                }
            }
        }

        marks.insert(name.to_string(), VisitMark::Done);
        order.push(name.to_string());
        Ok(())
    }

    /// Topological order over the `main` connection graph, via a depth-first
    /// post-order walk reversed at the end (rather than an in-degree queue):
    /// each node is appended only after every node it points to has already
    /// been resolved, so reversing that order puts sources before sinks.
    /// Not used by the executor's own readiness-driven traversal; offered as
    /// a standalone validation/query utility.
    pub fn topological_sort(
        node_names: &[String],
        connections: &WorkflowConnections,
    ) -> Result<Vec<String>, super::super::error::WorkflowError> {
        let node_set: HashSet<String> = node_names.iter().cloned().collect();
        let mut marks: HashMap<String, VisitMark> = HashMap::new();
        let mut order: Vec<String> = Vec::with_capacity(node_names.len());

        for name in node_names {
            if visit_for_topological_sort(name, connections, &node_set, &mut marks, &mut order).is_err() {
                return Err(super::super::error::WorkflowError::InvalidWorkflow(
                    "workflow contains a cycle".to_string(),
                ));
            }
        }

        order.reverse();
        Ok(order)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn conns(pairs: &[(&str, &str, usize)]) -> WorkflowConnections {
            let mut result: WorkflowConnections = HashMap::new();
            for (src, dst, idx) in pairs {
                result
                    .entry(src.to_string())
                    .or_default()
                    .entry(CONNECTION_MAIN.to_string())
                    .or_insert_with(Vec::new);
                let by_index = result
                    .get_mut(*src)
                    .unwrap()
                    .get_mut(CONNECTION_MAIN)
                    .unwrap();
                while by_index.len() <= 0 {
                    by_index.push(Vec::new());
                }
                by_index[0].push(Connection::main(*dst, *idx));
            }
            result
        }

        #[test]
        fn ancestors_including_covers_linear_chain() {
            let c = conns(&[("A", "B", 0), ("B", "C", 0), ("D", "X", 0)]);
            let by_dest = map_connections_by_destination(&c);
            let anc = ancestors_including(&by_dest, "C");
            assert!(anc.contains("A"));
            assert!(anc.contains("B"));
            assert!(anc.contains("C"));
            assert!(!anc.contains("D"));
            assert!(!anc.contains("X"));
        }

        #[test]
        fn input_requirements_counts_distinct_ports_not_edges() {
            let mut c: WorkflowConnections = HashMap::new();
            c.entry("A".to_string())
                .or_default()
                .entry(CONNECTION_MAIN.to_string())
                .or_insert_with(|| vec![vec![Connection::main("C", 0), Connection::main("C", 0)]]);
            let by_dest = map_connections_by_destination(&c);
            let reqs = calculate_input_requirements(&by_dest);
            assert_eq!(reqs.get("C"), Some(&1));
        }

        #[test]
        fn topological_sort_detects_cycle() {
            let c = conns(&[("A", "B", 0), ("B", "A", 0)]);
            let names = vec!["A".to_string(), "B".to_string()];
            assert!(topological_sort(&names, &c).is_err());
        }

        #[test]
        fn dfs_and_bfs_child_traversal_agree_on_reachable_set() {
            let c = conns(&[("A", "B", 0), ("B", "C", 0), ("A", "C", 1)]);
            let mut bfs = get_child_nodes_bfs(&c, "A", None, None);
            let mut dfs = get_child_nodes_dfs(&c, "A", None, None);
            bfs.sort();
            dfs.sort();
            assert_eq!(bfs, dfs);
        }
    }
}
