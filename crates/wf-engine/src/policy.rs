//! Error policy engine: a pure decision function over a node's error
//! handling configuration and a raised error, separated from the executor's
//! retry loop (which owns sleeping and attempt counting).

use wf_graph::{DataObject, Node};

/// The four recognized error policies, read from `node.parameters["onError"]`.
/// Defaults to [`ErrorPolicy::StopWorkflow`] when the key is absent or
/// unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    StopWorkflow,
    ContinueOnFail,
    RetryOnFail,
    ErrorOutput,
}

impl ErrorPolicy {
    pub fn from_str(s: &str) -> Self {
        match s {
            "continueOnFail" => ErrorPolicy::ContinueOnFail,
            "retryOnFail" => ErrorPolicy::RetryOnFail,
            "errorOutput" => ErrorPolicy::ErrorOutput,
            _ => ErrorPolicy::StopWorkflow,
        }
    }
}

/// The error-handling configuration extracted from a node's parameters.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPolicyConfig {
    pub policy: ErrorPolicy,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub error_output_index: usize,
}

impl ErrorPolicyConfig {
    /// Extract policy parameters from a node, per §4.4's extraction rules:
    /// `maxRetries` a non-negative integer, `retryDelay` a non-negative
    /// number of seconds, `errorOutputIndex` a non-negative integer
    /// (default 1).
    pub fn from_node(node: &Node) -> Self {
        let policy = node
            .get_parameter("onError")
            .and_then(|v| v.as_str())
            .map(ErrorPolicy::from_str)
            .unwrap_or_default();

        let max_retries = node
            .get_parameter("maxRetries")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        let retry_delay_secs = node
            .get_parameter("retryDelay")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .max(0.0);

        let error_output_index = node
            .get_parameter("errorOutputIndex")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as usize;

        Self {
            policy,
            max_retries,
            retry_delay_secs,
            error_output_index,
        }
    }
}

/// What the retry loop should do next, as decided by the pure function
/// [`decide`].
#[derive(Debug, Clone)]
pub enum PolicyAction {
    /// Sleep `delay_secs` (0 means no sleep), then re-invoke.
    Retry { delay_secs: f64 },
    /// Raise a terminal error; `message` carries the original failure.
    Stop { message: String },
    /// Treat this attempt as a success, with the given fallback items
    /// carried on port 0.
    Continue { fallback_items: Vec<DataObject> },
    /// Treat this attempt as a success, with one error item placed at
    /// `port`, all lower-indexed ports empty.
    ErrorOutput { port: usize, item: DataObject },
}

/// Build the single-item error payload `{error: <message>, errorType: <kind>}`
/// the source's dead-code `error_handler.py` module and this specification
/// both use (the live Python retry loop instead uses `errType`, a
/// discrepancy this implementation does not carry over).
pub fn error_item(message: &str, error_type: &str) -> DataObject {
    let mut item = DataObject::new();
    item.insert("error".to_string(), message.into());
    item.insert("errorType".to_string(), error_type.into());
    item
}

/// The pure decision function: given the policy configuration, the current
/// (one-indexed) attempt number, and the error that was just raised, decide
/// what the retry loop should do next. Performs no I/O, no sleeping, no
/// mutation.
pub fn decide(config: &ErrorPolicyConfig, attempt: u32, error_message: &str, error_type: &str) -> PolicyAction {
    match config.policy {
        ErrorPolicy::StopWorkflow => PolicyAction::Stop {
            message: error_message.to_string(),
        },
        ErrorPolicy::ContinueOnFail => PolicyAction::Continue {
            fallback_items: vec![error_item(error_message, error_type)],
        },
        ErrorPolicy::RetryOnFail => {
            if attempt <= config.max_retries {
                PolicyAction::Retry {
                    delay_secs: config.retry_delay_secs,
                }
            } else {
                PolicyAction::Stop {
                    message: error_message.to_string(),
                }
            }
        }
        ErrorPolicy::ErrorOutput => PolicyAction::ErrorOutput {
            port: config.error_output_index,
            item: error_item(error_message, error_type),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_graph::NodeParameterValue;

    fn config(policy: &str, max_retries: u64) -> ErrorPolicyConfig {
        let mut node = Node::new("n", "generic");
        node.set_parameter("onError", NodeParameterValue::String(policy.to_string()));
        node.set_parameter("maxRetries", NodeParameterValue::Number(max_retries as f64));
        ErrorPolicyConfig::from_node(&node)
    }

    #[test]
    fn default_policy_is_stop_workflow() {
        let node = Node::new("n", "generic");
        let config = ErrorPolicyConfig::from_node(&node);
        assert_eq!(config.policy, ErrorPolicy::StopWorkflow);
    }

    #[test]
    fn retry_on_fail_retries_until_max_then_stops() {
        let config = config("retryOnFail", 2);
        assert!(matches!(decide(&config, 1, "boom", "Err"), PolicyAction::Retry { .. }));
        assert!(matches!(decide(&config, 2, "boom", "Err"), PolicyAction::Retry { .. }));
        assert!(matches!(decide(&config, 3, "boom", "Err"), PolicyAction::Stop { .. }));
    }

    #[test]
    fn continue_on_fail_produces_tagged_error_item() {
        let config = config("continueOnFail", 0);
        match decide(&config, 1, "boom", "ValueError") {
            PolicyAction::Continue { fallback_items } => {
                assert_eq!(fallback_items.len(), 1);
                assert_eq!(
                    fallback_items[0].get("errorType").and_then(|v| v.as_str()),
                    Some("ValueError")
                );
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn error_output_defaults_to_port_one() {
        let mut node = Node::new("n", "generic");
        node.set_parameter("onError", NodeParameterValue::String("errorOutput".to_string()));
        let config = ErrorPolicyConfig::from_node(&node);
        assert_eq!(config.error_output_index, 1);
        match decide(&config, 1, "boom", "Err") {
            PolicyAction::ErrorOutput { port, .. } => assert_eq!(port, 1),
            other => panic!("expected ErrorOutput, got {other:?}"),
        }
    }
}
