//! Node renaming and parameter-reference rewriting.
//!
//! A graph-authoring utility, not invoked by the executor. It rewrites three
//! textual reference shapes found inside a node's parameter tree —
//! `$node["name"]`, `$node.name`, `$items("name")` — so that renaming a node
//! does not leave dangling references. This never evaluates expressions; it
//! performs a textual substitution over the parameter tree.

use regex::Regex;

use crate::data::NodeParameterValue;
use crate::error::WorkflowError;
use crate::workflow::Workflow;

fn reference_patterns(old_name: &str) -> Vec<Regex> {
    let escaped = regex::escape(old_name);
    vec![
        Regex::new(&format!(r#"\$node\[\s*["']{escaped}["']\s*\]"#)).unwrap(),
        Regex::new(&format!(r"\$node\.{escaped}\b")).unwrap(),
        Regex::new(&format!(r#"\$items\(\s*["']{escaped}["']\s*\)"#)).unwrap(),
    ]
}

fn replacement_for(pattern_index: usize, new_name: &str) -> String {
    match pattern_index {
        0 => format!("$$node[\"{new_name}\"]"),
        1 => format!("$$node.{new_name}"),
        2 => format!("$$items(\"{new_name}\")"),
        _ => unreachable!(),
    }
}

fn rewrite_string(value: &str, old_name: &str, new_name: &str) -> String {
    let mut result = value.to_string();
    for (i, pattern) in reference_patterns(old_name).into_iter().enumerate() {
        let replacement = replacement_for(i, new_name);
        result = pattern.replace_all(&result, replacement.as_str()).into_owned();
    }
    result
}

fn rewrite_parameter_value(value: &NodeParameterValue, old_name: &str, new_name: &str) -> NodeParameterValue {
    match value {
        NodeParameterValue::String(s) => NodeParameterValue::String(rewrite_string(s, old_name, new_name)),
        NodeParameterValue::Array(items) => NodeParameterValue::Array(
            items.iter().map(|v| rewrite_parameter_value(v, old_name, new_name)).collect(),
        ),
        NodeParameterValue::Object(map) => NodeParameterValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), rewrite_parameter_value(v, old_name, new_name)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Rename `old_name` to `new_name` throughout a workflow: the node entry
/// itself, every connection referencing it (as source or destination), and
/// every textual reference inside every node's parameter tree.
pub fn rename_node(workflow: &mut Workflow, old_name: &str, new_name: &str) -> Result<(), WorkflowError> {
    if workflow.get_node(old_name).is_none() {
        return Err(WorkflowError::NodeNotFound(old_name.to_string()));
    }
    if old_name == new_name {
        return Ok(());
    }
    if workflow.get_node(new_name).is_some() {
        return Err(WorkflowError::InvalidWorkflow(format!(
            "node already exists: {new_name}"
        )));
    }

    if let Some(node) = workflow.get_node_mut(old_name) {
        node.name = new_name.to_string();
    }

    if let Some(conns) = workflow.connections_by_source.remove(old_name) {
        workflow.connections_by_source.insert(new_name.to_string(), conns);
    }

    for node_conns in workflow.connections_by_source.values_mut() {
        for by_index in node_conns.values_mut() {
            for connections_at_index in by_index.iter_mut() {
                for conn in connections_at_index.iter_mut() {
                    if conn.node == old_name {
                        conn.node = new_name.to_string();
                    }
                }
            }
        }
    }

    for node in workflow.nodes.iter_mut() {
        let rewritten: Vec<(String, NodeParameterValue)> = node
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), rewrite_parameter_value(v, old_name, new_name)))
            .collect();
        node.parameters = rewritten.into_iter().collect();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn rename_rewrites_all_three_reference_shapes() {
        let mut wf = Workflow::new("wf1", "test");
        let mut a = Node::new("A", "producer");
        a.set_parameter(
            "expr",
            NodeParameterValue::String(r#"$node["A"].data + $items("A") + $node.A"#.to_string()),
        );
        wf.add_node(a);
        wf.add_node(Node::new("B", "generic"));
        wf.connect("A", "B", 0, 0).unwrap();

        rename_node(&mut wf, "A", "A_new").unwrap();

        assert!(wf.get_node("A").is_none());
        let renamed = wf.get_node("A_new").unwrap();
        let expr = renamed.get_parameter("expr").unwrap().as_str().unwrap();
        assert!(expr.contains(r#"$node["A_new"]"#));
        assert!(expr.contains(r#"$items("A_new")"#));
        assert!(expr.contains("$node.A_new"));
        assert!(!expr.contains(r#"$node["A"]"#));

        assert!(wf.connections_by_source.contains_key("A_new"));
        assert!(!wf.connections_by_source.contains_key("A"));
    }

    #[test]
    fn rename_unknown_node_errors() {
        let mut wf = Workflow::new("wf1", "test");
        wf.add_node(Node::new("A", "producer"));
        assert!(rename_node(&mut wf, "missing", "x").is_err());
    }
}
