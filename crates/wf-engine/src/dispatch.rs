//! Node type dispatcher: maps a [`Node`] to a [`NodeType`] capability record.

use std::sync::Arc;

use async_trait::async_trait;
use wf_graph::{DataObject, ExecutionMode, GenericValue, Item};

use crate::error::ExecutionEngineError;
use crate::runtime::GlobalConfig;

/// What a node execution sees.
#[derive(Debug, Clone)]
pub struct NodeExecutionContext {
    pub node_name: String,
    pub input_data: Vec<Item>,
    pub mode: ExecutionMode,
    pub global_config: GlobalConfig,
}

/// A node's execution logic. Built-in logics (§4.2) implement this; the
/// sub-workflow invoker additionally needs to spawn a child executor, which
/// is why `execute` is async and fallible rather than a bare function.
#[async_trait]
pub trait NodeLogic: Send + Sync {
    async fn execute(&self, context: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError>;
}

/// The capability record the dispatcher returns for a node: its name, a
/// `NodeLogic` handle, and the two flags the executor's main loop branches
/// on before ever invoking `execute`.
#[derive(Clone)]
pub struct NodeType {
    pub name: &'static str,
    pub can_execute: bool,
    pub is_trigger: bool,
    pub logic: Arc<dyn NodeLogic>,
}

/// Classify a node's type string and return its capability record.
///
/// Dispatch rule (exactly this order — §4.2): match the lowercased type
/// string against these substrings and pick the first match: `producer`,
/// `switch`, `trigger`, `condition`, `executesubworkflow`; otherwise fall
/// back to the generic passthrough.
pub fn dispatch(node_type: &str) -> NodeType {
    let lower = node_type.to_lowercase();

    if lower.contains("producer") {
        NodeType {
            name: "producer",
            can_execute: true,
            is_trigger: false,
            logic: Arc::new(ProducerLogic),
        }
    } else if lower.contains("switch") {
        NodeType {
            name: "switch",
            can_execute: true,
            is_trigger: false,
            logic: Arc::new(SwitchLogic),
        }
    } else if lower.contains("trigger") {
        NodeType {
            name: "trigger",
            can_execute: false,
            is_trigger: true,
            logic: Arc::new(TriggerSentinelLogic),
        }
    } else if lower.contains("condition") {
        NodeType {
            name: "condition",
            can_execute: true,
            is_trigger: false,
            logic: Arc::new(ConditionLogic),
        }
    } else if lower.contains("executesubworkflow") {
        NodeType {
            name: "executeSubWorkflow",
            can_execute: true,
            is_trigger: false,
            logic: Arc::new(crate::subworkflow::SubWorkflowLogic),
        }
    } else {
        NodeType {
            name: "generic",
            can_execute: true,
            is_trigger: false,
            logic: Arc::new(PassthroughLogic),
        }
    }
}

fn tag_processed_by(mut item: Item, node_name: &str) -> Item {
    item.insert("processedBy".to_string(), GenericValue::String(node_name.to_string()));
    item
}

/// Copy each input item, tag `processedBy`, emit on port 0.
struct PassthroughLogic;

#[async_trait]
impl NodeLogic for PassthroughLogic {
    async fn execute(&self, ctx: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError> {
        let out: Vec<Item> = ctx
            .input_data
            .into_iter()
            .map(|item| tag_processed_by(item, &ctx.node_name))
            .collect();
        Ok(wf_graph::NodeResult::single_port(out))
    }
}

/// If no input items, synthesize one; otherwise behave like passthrough.
struct ProducerLogic;

#[async_trait]
impl NodeLogic for ProducerLogic {
    async fn execute(&self, ctx: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError> {
        if ctx.input_data.is_empty() {
            let mut item = DataObject::new();
            item.insert("source".to_string(), GenericValue::String("producer".to_string()));
            item.insert(
                "msg".to_string(),
                GenericValue::String(format!("Data from {}", ctx.node_name)),
            );
            item.insert("processedBy".to_string(), GenericValue::String(ctx.node_name.clone()));
            Ok(wf_graph::NodeResult::single_port(vec![item]))
        } else {
            PassthroughLogic.execute(ctx).await
        }
    }
}

fn split_by<F>(items: Vec<Item>, node_name: &str, predicate: F) -> (Vec<Item>, Vec<Item>)
where
    F: Fn(&Item) -> bool,
{
    let mut true_port = Vec::new();
    let mut false_port = Vec::new();
    for item in items {
        let is_true = predicate(&item);
        let mut item = tag_processed_by(item, node_name);
        item.insert("branch".to_string(), GenericValue::String(is_true.to_string()));
        if is_true {
            true_port.push(item);
        } else {
            false_port.push(item);
        }
    }
    (true_port, false_port)
}

/// Split items by `item.category == "A"` into port 0 / port 1.
struct SwitchLogic;

#[async_trait]
impl NodeLogic for SwitchLogic {
    async fn execute(&self, ctx: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError> {
        let (port0, port1) = split_by(ctx.input_data, &ctx.node_name, |item| {
            matches!(item.get("category"), Some(GenericValue::String(s)) if s == "A")
        });
        Ok(wf_graph::NodeResult::new(vec![port0, port1]))
    }
}

/// Identical to [`SwitchLogic`] but keyed on the boolean `item.pass`.
struct ConditionLogic;

#[async_trait]
impl NodeLogic for ConditionLogic {
    async fn execute(&self, ctx: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError> {
        let (port0, port1) = split_by(ctx.input_data, &ctx.node_name, |item| {
            matches!(item.get("pass"), Some(GenericValue::Bool(true)))
        });
        Ok(wf_graph::NodeResult::new(vec![port0, port1]))
    }
}

/// Dead code from the dispatcher's point of view: the executor handles
/// trigger behavior itself (§4.5) before ever calling `execute`, so this
/// logic is never invoked. It exists only so `NodeType` always has a
/// well-formed `logic` handle.
struct TriggerSentinelLogic;

#[async_trait]
impl NodeLogic for TriggerSentinelLogic {
    async fn execute(&self, _ctx: NodeExecutionContext) -> Result<wf_graph::NodeResult, ExecutionEngineError> {
        unreachable!("trigger nodes are handled by the executor before dispatch, not via NodeLogic::execute")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_graph::DataObject;

    fn ctx(node_name: &str, items: Vec<Item>) -> NodeExecutionContext {
        NodeExecutionContext {
            node_name: node_name.to_string(),
            input_data: items,
            mode: ExecutionMode::manual(),
            global_config: GlobalConfig::new(),
        }
    }

    #[tokio::test]
    async fn dispatch_order_matches_spec_precisely() {
        assert_eq!(dispatch("myProducerNode").name, "producer");
        assert_eq!(dispatch("switchRouter").name, "switch");
        assert_eq!(dispatch("webhookTrigger").name, "trigger");
        assert_eq!(dispatch("conditionCheck").name, "condition");
        assert_eq!(dispatch("executeSubWorkflow").name, "executeSubWorkflow");
        assert_eq!(dispatch("httpRequest").name, "generic");
    }

    #[tokio::test]
    async fn producer_with_no_input_synthesizes_one_item() {
        let nt = dispatch("producer");
        let result = nt.logic.execute(ctx("A", vec![])).await.unwrap();
        let data = result.data.unwrap();
        assert_eq!(data[0].len(), 1);
        assert_eq!(
            data[0][0].get("msg").and_then(|v| v.as_str()),
            Some("Data from A")
        );
    }

    #[tokio::test]
    async fn switch_splits_by_category() {
        let nt = dispatch("switchNode");
        let mut a = DataObject::new();
        a.insert("category".to_string(), GenericValue::String("A".to_string()));
        let mut b = DataObject::new();
        b.insert("category".to_string(), GenericValue::String("B".to_string()));

        let result = nt.logic.execute(ctx("S", vec![a, b])).await.unwrap();
        let data = result.data.unwrap();
        assert_eq!(data[0].len(), 1);
        assert_eq!(data[1].len(), 1);
    }
}
