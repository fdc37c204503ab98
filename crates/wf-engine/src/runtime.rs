//! Shared, mutable run-scoped state, and the cancellation extension point.

use std::sync::Arc;

use parking_lot::RwLock;
use wf_graph::{DataObject, GenericValue};

/// A shared-read bag nodes may also mutate. Modeled as `Arc<RwLock<..>>` so
/// that a mutation made during a retried attempt, or inside a sub-workflow
/// invocation, is visible to later attempts and to the parent — the
/// specification's §5 shared-resource policy explicitly requires this
/// (the source's retry-counter test relies on `global_config` persisting a
/// counter across attempts).
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    inner: Arc<RwLock<DataObject>>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DataObject::new())),
        }
    }

    pub fn from_data(data: DataObject) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub fn get(&self, key: &str) -> Option<GenericValue> {
        self.inner.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: GenericValue) {
        self.inner.write().insert(key.into(), value);
    }

    /// Increment an integer counter stored under `key`, starting from 0,
    /// returning the new value. Mirrors the
    /// `global_config.setdefault(key, 0); global_config[key] += 1` pattern
    /// the source's retry-accounting test relies on.
    pub fn increment_counter(&self, key: &str) -> i64 {
        let mut guard = self.inner.write();
        let next = match guard.get(key) {
            Some(GenericValue::Integer(n)) => n + 1,
            _ => 1,
        };
        guard.insert(key.to_string(), GenericValue::Integer(next));
        next
    }

    pub fn snapshot(&self) -> DataObject {
        self.inner.read().clone()
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// An optional, host-pollable cancellation point. Not part of the core
/// contract (§5): the executor never checks this itself; a host that wants
/// cooperative cancellation polls `is_cancelled()` between node executions
/// via its own hook, or holds onto the clone it was given at construction.
#[derive(Clone)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_persists_across_clones_of_the_same_config() {
        let config = GlobalConfig::new();
        let cloned = config.clone();

        assert_eq!(config.increment_counter("tries"), 1);
        assert_eq!(cloned.increment_counter("tries"), 2);
        assert_eq!(config.increment_counter("tries"), 3);
    }

    #[test]
    fn cancellation_token_clone_shares_state() {
        let token = CancellationToken::new();
        let cloned = token.clone();
        cloned.cancel();
        assert!(token.is_cancelled());
    }
}
