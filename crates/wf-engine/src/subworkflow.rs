//! The `executeSubWorkflow` node logic: runs a nested [`Workflow`] to
//! completion and folds its [`RunReport`] back into a single output item.

use async_trait::async_trait;
use wf_graph::{DataObject, ExecutionError, GenericValue, Item, NodeResult, Workflow};

use crate::dispatch::{NodeExecutionContext, NodeLogic};
use crate::error::ExecutionEngineError;
use crate::executor::Executor;

/// Reads the child workflow definition from `global_config["subWorkflow"]`
/// (the embedding host is responsible for placing it there — this engine
/// has no loader of its own, per §4.2's scope boundary). Spawns a fresh
/// [`Executor`] per invocation so a sub-workflow's own LIFO stack and
/// waiting-data buffers never interleave with the parent's.
///
/// Failures here (a malformed `subWorkflow` payload) are reported on
/// `NodeResult.error`, not raised as an `Err` from `execute` — the parent's
/// error policy, not this logic, decides what happens next.
pub struct SubWorkflowLogic;

#[async_trait]
impl NodeLogic for SubWorkflowLogic {
    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeResult, ExecutionEngineError> {
        let Some(raw) = ctx.global_config.get("subWorkflow") else {
            return Ok(NodeResult::empty());
        };

        let workflow: Workflow = match serde_json::to_value(&raw).and_then(serde_json::from_value) {
            Ok(wf) => wf,
            Err(e) => return Ok(NodeResult::failed(ExecutionError::new(format!("subWorkflow is not a valid workflow: {e}")))),
        };

        let child = Executor::new();
        let report = child
            .run(&workflow, ctx.mode.clone(), ctx.global_config.clone(), None, Vec::new(), std::collections::HashMap::new())
            .await;

        let run_data: GenericValue = match serde_json::to_value(&report.run_data).and_then(serde_json::from_value) {
            Ok(v) => v,
            Err(e) => return Ok(NodeResult::failed(ExecutionError::new(format!("failed to encode sub-run data: {e}")))),
        };

        let mut item: Item = DataObject::new();
        item.insert("subRunData".to_string(), run_data);
        item.insert(
            "subStatus".to_string(),
            GenericValue::String(report.status.as_str().to_string()),
        );

        Ok(NodeResult::single_port(vec![item]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::GlobalConfig;
    use wf_graph::ExecutionMode;

    fn ctx(global_config: GlobalConfig) -> NodeExecutionContext {
        NodeExecutionContext {
            node_name: "sub".to_string(),
            input_data: vec![],
            mode: ExecutionMode::manual(),
            global_config,
        }
    }

    #[tokio::test]
    async fn missing_sub_workflow_yields_empty_result() {
        let result = SubWorkflowLogic
            .execute(ctx(GlobalConfig::new()))
            .await
            .unwrap();
        assert!(result.data.unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn runs_an_embedded_workflow_and_reports_its_status() {
        let mut child = Workflow::new("child", "child workflow");
        child.add_node(wf_graph::Node::new("start", "producerNode"));

        let global_config = GlobalConfig::new();
        let encoded = serde_json::to_value(&child).unwrap();
        let as_generic: GenericValue = serde_json::from_value(encoded).unwrap();
        global_config.set("subWorkflow", as_generic);

        let result = SubWorkflowLogic.execute(ctx(global_config)).await.unwrap();
        let data = result.data.unwrap();
        assert_eq!(data[0].len(), 1);
        assert_eq!(
            data[0][0].get("subStatus").and_then(|v| v.as_str()),
            Some("SUCCESS")
        );
    }
}
