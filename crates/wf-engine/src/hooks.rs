//! Synchronous event fan-out with per-callback failure isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use wf_graph::{ExecutionError, Item, Node, RunReport, Workflow};

/// A typed payload handed to every callback subscribed to an event.
///
/// String-keyed dispatch (event name -> callbacks) stays at the API
/// boundary per the specification; internally each event carries this
/// typed enum instead of untyped positional arguments.
#[derive(Debug, Clone)]
pub enum HookEvent<'a> {
    WorkflowExecuteBefore { workflow: &'a Workflow, started_at: f64 },
    WorkflowExecuteAfter { report: &'a RunReport, finished_at: f64 },
    NodeExecuteBefore { node: &'a Node, input_data: &'a [Item], timestamp: f64 },
    NodeExecuteAfter { node: &'a Node, result: &'a wf_graph::NodeResult, timestamp: f64 },
}

pub const WORKFLOW_EXECUTE_BEFORE: &str = "workflowExecuteBefore";
pub const WORKFLOW_EXECUTE_AFTER: &str = "workflowExecuteAfter";
pub const NODE_EXECUTE_BEFORE: &str = "nodeExecuteBefore";
pub const NODE_EXECUTE_AFTER: &str = "nodeExecuteAfter";

type Callback = Box<dyn Fn(&HookEvent) + Send + Sync>;

/// An opaque token returned by [`HookManager::register`]. Closures have no
/// stable equality in Rust, so unregistration goes through this handle
/// rather than comparing callbacks, unlike a dynamically-typed host that can
/// filter a list by function identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

struct Registration {
    handle: HookHandle,
    callback: Callback,
}

/// Name -> ordered list of subscriber callbacks, invoked synchronously on
/// the caller's thread in registration order. A callback that panics or
/// (if fallible) errors is caught and logged; it never stops the remaining
/// callbacks from running or interferes with engine execution.
#[derive(Default)]
pub struct HookManager {
    hooks: HashMap<String, Vec<Registration>>,
    next_handle: AtomicU64,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, event: impl Into<String>, callback: F) -> HookHandle
    where
        F: Fn(&HookEvent) + Send + Sync + 'static,
    {
        let handle = HookHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.hooks
            .entry(event.into())
            .or_default()
            .push(Registration {
                handle,
                callback: Box::new(callback),
            });
        handle
    }

    pub fn unregister(&mut self, handle: HookHandle) {
        for registrations in self.hooks.values_mut() {
            registrations.retain(|r| r.handle != handle);
        }
    }

    /// Run every callback registered for `event`, in registration order.
    /// A callback that unwinds is caught via `catch_unwind` and logged at
    /// warning level; it does not prevent the remaining callbacks from
    /// running.
    pub fn run(&self, event: &str, payload: &HookEvent) {
        let Some(registrations) = self.hooks.get(event) else {
            return;
        };
        for registration in registrations {
            let callback = &registration.callback;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(payload);
            }));
            if let Err(panic) = result {
                let message = panic_message(&panic);
                tracing::warn!(event, error = %message, "hook callback failed");
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Convenience used by hook callbacks that only want to know a node failed.
pub fn execution_error_summary(error: &ExecutionError) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn callbacks_run_in_registration_order() {
        let mut hooks = HookManager::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o1 = order.clone();
        hooks.register(WORKFLOW_EXECUTE_BEFORE, move |_| o1.lock().push(1));
        let o2 = order.clone();
        hooks.register(WORKFLOW_EXECUTE_BEFORE, move |_| o2.lock().push(2));

        let wf = Workflow::new("wf1", "test");
        hooks.run(
            WORKFLOW_EXECUTE_BEFORE,
            &HookEvent::WorkflowExecuteBefore { workflow: &wf, started_at: 0.0 },
        );

        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn a_failing_callback_does_not_stop_later_callbacks() {
        let mut hooks = HookManager::new();
        let ran = Arc::new(AtomicUsize::new(0));

        hooks.register(WORKFLOW_EXECUTE_BEFORE, |_| panic!("boom"));
        let ran2 = ran.clone();
        hooks.register(WORKFLOW_EXECUTE_BEFORE, move |_| {
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        let wf = Workflow::new("wf1", "test");
        hooks.run(
            WORKFLOW_EXECUTE_BEFORE,
            &HookEvent::WorkflowExecuteBefore { workflow: &wf, started_at: 0.0 },
        );

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_removes_only_the_targeted_callback() {
        let mut hooks = HookManager::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        let h1 = hooks.register(WORKFLOW_EXECUTE_BEFORE, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        hooks.register(WORKFLOW_EXECUTE_BEFORE, move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        hooks.unregister(h1);

        let wf = Workflow::new("wf1", "test");
        hooks.run(
            WORKFLOW_EXECUTE_BEFORE,
            &HookEvent::WorkflowExecuteBefore { workflow: &wf, started_at: 0.0 },
        );

        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
