//! The executor/scheduler: a LIFO work stack over a workflow's `main`
//! connection graph, with multi-input merge buffering and the error-policy
//! retry loop.

use std::collections::{HashMap, HashSet};

use wf_graph::connection::graph as graph_utils;
use wf_graph::{
    DataObject, ExecutionError, ExecutionMode, ExecutionStatus, GenericValue, Item, Node,
    NodeResult, RunData, RunError, RunReport, TaskData, Workflow,
};

use crate::dispatch::{dispatch, NodeExecutionContext};
use crate::error::ExecutionEngineError;
use crate::hooks::{HookEvent, HookManager, NODE_EXECUTE_AFTER, NODE_EXECUTE_BEFORE, WORKFLOW_EXECUTE_AFTER, WORKFLOW_EXECUTE_BEFORE};
use crate::policy::{decide, ErrorPolicyConfig, PolicyAction};
use crate::runtime::GlobalConfig;

/// One entry in the LIFO work stack: a node to run and the already-merged
/// input items for it (`None` for an auto-discovered start node with no
/// caller-supplied seed).
struct WorkItem {
    node_name: String,
    input_data: Option<Vec<Item>>,
}

/// Per-destination buffer of items received so far, indexed by destination
/// port. A node becomes ready only once every port in `[0, requirement)`
/// holds at least one (possibly empty) entry.
type WaitingData = HashMap<String, HashMap<usize, Vec<Item>>>;

/// Runs one workflow to completion. Stateless between calls: `execute`
/// builds and owns its `run_data`/`waiting_data`/work stack locally, so the
/// same `Executor` can be reused, and a sub-workflow invocation always gets
/// a fresh instance (`Executor::new`) rather than sharing state with its
/// parent.
pub struct Executor {
    pub hooks: HookManager,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            hooks: HookManager::new(),
        }
    }

    pub fn with_hooks(hooks: HookManager) -> Self {
        Self { hooks }
    }

    /// Execute `workflow`. `destination` restricts execution to the
    /// ancestor sub-graph of that node (§4.1's sub-graph pruning);
    /// `start_node_names` overrides automatic start-node discovery;
    /// `start_inputs` seeds a start node's input items directly, bypassing
    /// the usual upstream-produced data (§4.5's `start_inputs[node_name]`).
    pub async fn run(
        &self,
        workflow: &Workflow,
        mode: ExecutionMode,
        global_config: GlobalConfig,
        destination: Option<&str>,
        start_node_names: Vec<String>,
        start_inputs: HashMap<String, Vec<Item>>,
    ) -> RunReport {
        let started_at = monotonic_seconds();

        self.hooks.run(
            WORKFLOW_EXECUTE_BEFORE,
            &HookEvent::WorkflowExecuteBefore { workflow, started_at },
        );

        let connections_by_dest = graph_utils::map_connections_by_destination(&workflow.connections_by_source);
        let input_requirements = graph_utils::calculate_input_requirements(&connections_by_dest);

        let sub_graph: Option<HashSet<String>> =
            destination.map(|d| graph_utils::ancestors_including(&connections_by_dest, d));

        let mut run_data: RunData = RunData::new();
        let mut waiting_data: WaitingData = WaitingData::new();
        let mut stack: Vec<WorkItem> = Vec::new();

        if let Err(err) = seed_stack(workflow, &start_node_names, &start_inputs, sub_graph.as_ref(), &mut stack) {
            return error_report(started_at, run_data, err);
        }

        let mut terminal_error: Option<ExecutionEngineError> = None;

        'main: while let Some(item) = stack.pop() {
            let Some(node) = workflow.get_node(&item.node_name) else {
                continue;
            };

            if let Some(sub) = &sub_graph {
                if !sub.contains(&node.name) {
                    continue;
                }
            }

            if node.disabled {
                let stub = NodeResult::single_port(item.input_data.clone().unwrap_or_default());
                record(&mut run_data, node, stub);
                continue;
            }

            self.hooks.run(
                NODE_EXECUTE_BEFORE,
                &HookEvent::NodeExecuteBefore {
                    node,
                    input_data: item.input_data.as_deref().unwrap_or(&[]),
                    timestamp: monotonic_seconds(),
                },
            );

            let node_type = dispatch(&node.node_type);
            let attempt_started = monotonic_seconds();

            let result = self
                .run_node(node, &node_type, item.input_data.clone().unwrap_or_default(), &mode, &global_config)
                .await;

            let execution_time = ((monotonic_seconds() - attempt_started) * 1000.0) as i64;
            let task = TaskData::new((attempt_started * 1000.0) as i64, execution_time, result.clone());

            self.hooks.run(
                NODE_EXECUTE_AFTER,
                &HookEvent::NodeExecuteAfter {
                    node,
                    result: &task.result,
                    timestamp: monotonic_seconds(),
                },
            );

            run_data.entry(node.name.clone()).or_default().push(task);

            if let Some(error) = result.error {
                terminal_error = Some(ExecutionEngineError::NodeExecution {
                    node: node.name.clone(),
                    message: error.message,
                });
                break 'main;
            }

            let Some(ports) = result.data else {
                continue;
            };

            let outgoing = workflow
                .connections_by_source
                .get(&node.name)
                .and_then(|by_type| by_type.get(wf_graph::connection::CONNECTION_MAIN));

            let Some(outgoing) = outgoing else {
                continue;
            };

            for (port_index, items) in ports.into_iter().enumerate() {
                let Some(targets) = outgoing.get(port_index) else {
                    continue;
                };
                for conn in targets {
                    if let Some(sub) = &sub_graph {
                        if !sub.contains(&conn.node) {
                            continue;
                        }
                    }
                    waiting_data
                        .entry(conn.node.clone())
                        .or_default()
                        .entry(conn.index)
                        .or_default()
                        .extend(items.iter().cloned());

                    if is_ready(&waiting_data, &conn.node, &input_requirements) {
                        let buffers = waiting_data.remove(&conn.node).unwrap();
                        let mut combined = Vec::new();
                        let max_port = buffers.keys().copied().max().unwrap_or(0);
                        for p in 0..=max_port {
                            if let Some(items) = buffers.get(&p) {
                                combined.extend(items.iter().cloned());
                            }
                        }
                        stack.push(WorkItem {
                            node_name: conn.node.clone(),
                            input_data: Some(combined),
                        });
                    }
                }
            }
        }

        let finished_at = monotonic_seconds();
        let (status, error) = match terminal_error {
            Some(err) => (ExecutionStatus::Error, Some(RunError::from(ExecutionError::from(err)))),
            None => (ExecutionStatus::Success, None),
        };

        let report = RunReport {
            status,
            started_at,
            finished_at,
            execution_time: finished_at - started_at,
            run_data,
            error,
        };

        self.hooks.run(
            WORKFLOW_EXECUTE_AFTER,
            &HookEvent::WorkflowExecuteAfter { report: &report, finished_at },
        );

        report
    }

    /// The trigger/passthrough/execute procedure (§4.5).
    async fn run_node(
        &self,
        node: &Node,
        node_type: &crate::dispatch::NodeType,
        input_data: Vec<Item>,
        mode: &ExecutionMode,
        global_config: &GlobalConfig,
    ) -> NodeResult {
        if node_type.is_trigger {
            return if mode.is_manual() {
                let mut item = DataObject::new();
                item.insert("trig".to_string(), GenericValue::Bool(true));
                NodeResult::single_port(vec![item])
            } else {
                NodeResult::single_port(input_data)
            };
        }

        if !node_type.can_execute {
            return NodeResult::single_port(input_data);
        }

        let config = ErrorPolicyConfig::from_node(node);
        let mut attempt = 1u32;

        loop {
            let context = NodeExecutionContext {
                node_name: node.name.clone(),
                input_data: input_data.clone(),
                mode: mode.clone(),
                global_config: global_config.clone(),
            };

            match node_type.logic.execute(context).await {
                Ok(result) if result.error.is_none() => return result,
                Ok(result) => {
                    let error = result.error.unwrap();
                    match self.apply_policy(&config, attempt, &error.message, "NodeError").await {
                        PolicyAction::Retry { .. } => {
                            attempt += 1;
                            continue;
                        }
                        PolicyAction::Stop { message } => return NodeResult::failed(ExecutionError::new(message)),
                        PolicyAction::Continue { fallback_items } => return NodeResult::single_port(fallback_items),
                        PolicyAction::ErrorOutput { port, item } => return error_output_result(port, item),
                    }
                }
                Err(err) => match self.apply_policy(&config, attempt, &err.to_string(), "EngineError").await {
                    PolicyAction::Retry { .. } => {
                        attempt += 1;
                        continue;
                    }
                    PolicyAction::Stop { message } => return NodeResult::failed(ExecutionError::new(message)),
                    PolicyAction::Continue { fallback_items } => return NodeResult::single_port(fallback_items),
                    PolicyAction::ErrorOutput { port, item } => return error_output_result(port, item),
                },
            }
        }
    }

    async fn apply_policy(&self, config: &ErrorPolicyConfig, attempt: u32, message: &str, error_type: &str) -> PolicyAction {
        let action = decide(config, attempt, message, error_type);
        if let PolicyAction::Retry { delay_secs } = &action {
            if *delay_secs > 0.0 {
                tokio::time::sleep(std::time::Duration::from_secs_f64(*delay_secs)).await;
            }
        }
        action
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn error_output_result(port: usize, item: DataObject) -> NodeResult {
    let mut ports = vec![Vec::new(); port + 1];
    ports[port] = vec![item];
    NodeResult::new(ports)
}

fn is_ready(waiting_data: &WaitingData, node_name: &str, input_requirements: &HashMap<String, usize>) -> bool {
    let Some(&required) = input_requirements.get(node_name) else {
        return true;
    };
    let Some(buffers) = waiting_data.get(node_name) else {
        return false;
    };
    (0..required).all(|p| buffers.contains_key(&p))
}

fn record(run_data: &mut RunData, node: &Node, result: NodeResult) {
    let now = (monotonic_seconds() * 1000.0) as i64;
    run_data.entry(node.name.clone()).or_default().push(TaskData::new(now, 0, result));
}

fn seed_stack(
    workflow: &Workflow,
    start_node_names: &[String],
    start_inputs: &HashMap<String, Vec<Item>>,
    sub_graph: Option<&HashSet<String>>,
    stack: &mut Vec<WorkItem>,
) -> Result<(), ExecutionEngineError> {
    if !start_node_names.is_empty() {
        for name in start_node_names {
            if workflow.get_node(name).is_none() {
                continue;
            }
            if let Some(sub) = sub_graph {
                if !sub.contains(name) {
                    continue;
                }
            }
            stack.push(WorkItem {
                node_name: name.clone(),
                input_data: start_inputs.get(name).cloned(),
            });
        }
        return Ok(());
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<&Node> = workflow.get_trigger_nodes();
    for node in workflow.rootless_nodes() {
        if !candidates.iter().any(|n| n.name == node.name) {
            candidates.push(node);
        }
    }

    for node in candidates {
        if let Some(sub) = sub_graph {
            if !sub.contains(&node.name) {
                continue;
            }
        }
        if seen.insert(node.name.clone()) {
            stack.push(WorkItem {
                node_name: node.name.clone(),
                input_data: start_inputs.get(&node.name).cloned(),
            });
        }
    }

    if stack.is_empty() {
        return Err(ExecutionEngineError::NoStartNodes);
    }

    Ok(())
}

fn error_report(started_at: f64, run_data: RunData, err: ExecutionEngineError) -> RunReport {
    let finished_at = monotonic_seconds();
    RunReport {
        status: ExecutionStatus::Error,
        started_at,
        finished_at,
        execution_time: finished_at - started_at,
        run_data,
        error: Some(RunError {
            message: err.to_string(),
            node_name: None,
        }),
    }
}

/// Seconds-since-epoch, f64. `std::time::SystemTime` rather than `chrono`'s
/// `Utc::now` keeps the executor's hot path off a dependency that formats
/// calendar dates it never needs.
fn monotonic_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_graph::NodeParameterValue;

    fn linear_workflow() -> Workflow {
        let mut wf = Workflow::new("wf1", "linear");
        wf.add_node(Node::new("start", "manualTrigger"));
        wf.add_node(Node::new("mid", "genericNode"));
        wf.connect("start", "mid", 0, 0).unwrap();
        wf
    }

    #[tokio::test]
    async fn a_simple_trigger_chain_completes_with_success() {
        let wf = linear_workflow();
        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), None, Vec::new(), HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
        assert!(report.run_data.contains_key("start"));
        assert!(report.run_data.contains_key("mid"));
    }

    #[tokio::test]
    async fn two_producers_merge_at_a_fan_in_node() {
        let mut wf = Workflow::new("wf1", "merge");
        wf.add_node(Node::new("a", "producerNode"));
        wf.add_node(Node::new("b", "producerNode"));
        wf.add_node(Node::new("merge", "genericNode"));
        wf.connect("a", "merge", 0, 0).unwrap();
        wf.connect("b", "merge", 0, 1).unwrap();

        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), None, Vec::new(), HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
        let merge_attempts = &report.run_data["merge"];
        assert_eq!(merge_attempts.len(), 1);
        let data = merge_attempts[0].result.data.as_ref().unwrap();
        assert_eq!(data[0].len(), 2);
    }

    #[tokio::test]
    async fn retry_on_fail_consumes_global_config_counter_across_attempts() {
        let mut wf = Workflow::new("wf1", "retry");
        let mut node = Node::new("flaky", "conditionNode");
        node.set_parameter("onError", NodeParameterValue::String("retryOnFail".to_string()));
        node.set_parameter("maxRetries", NodeParameterValue::Number(3.0));
        wf.add_node(node);

        let global_config = GlobalConfig::new();
        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), global_config, None, Vec::new(), HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn a_destination_node_restricts_execution_to_its_ancestors() {
        let mut wf = Workflow::new("wf1", "pruned");
        wf.add_node(Node::new("a", "producerNode"));
        wf.add_node(Node::new("b", "genericNode"));
        wf.add_node(Node::new("unrelated", "producerNode"));
        wf.connect("a", "b", 0, 0).unwrap();

        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), Some("b"), Vec::new(), HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
        assert!(!report.run_data.contains_key("unrelated"));
    }

    #[tokio::test]
    async fn disabled_nodes_are_stubbed_through_without_dispatch() {
        let mut wf = Workflow::new("wf1", "disabled");
        let mut node = Node::new("skip", "genericNode");
        node.disabled = true;
        wf.add_node(node);

        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), None, vec!["skip".to_string()], HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
        assert_eq!(report.run_data["skip"].len(), 1);
    }

    #[tokio::test]
    async fn no_start_nodes_found_is_a_structural_error_before_any_node_runs() {
        let wf = Workflow::new("wf1", "all connected in a cycle-free but rootless-free way");
        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), None, Vec::new(), HashMap::new())
            .await;

        assert_eq!(report.status, ExecutionStatus::Error);
        assert!(report.run_data.is_empty());
    }

    #[tokio::test]
    async fn start_inputs_seed_an_explicit_start_node_directly() {
        let mut wf = Workflow::new("wf1", "seeded");
        wf.add_node(Node::new("seeded", "genericNode"));

        let mut seed = DataObject::new();
        seed.insert("id".to_string(), GenericValue::Integer(1));
        let mut start_inputs = HashMap::new();
        start_inputs.insert("seeded".to_string(), vec![seed]);

        let executor = Executor::new();
        let report = executor
            .run(&wf, ExecutionMode::manual(), GlobalConfig::new(), None, vec!["seeded".to_string()], start_inputs)
            .await;

        assert_eq!(report.status, ExecutionStatus::Success);
        let data = report.run_data["seeded"][0].result.data.as_ref().unwrap();
        assert_eq!(data[0][0].get("id").and_then(|v| v.as_i64()), Some(1));
    }
}
