//! Data types flowing through a workflow run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tagged-value union standing in for the dynamic, JSON-like values that
/// flow between nodes and populate node parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GenericValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<GenericValue>),
    Object(DataObject),
}

impl Default for GenericValue {
    fn default() -> Self {
        GenericValue::Null
    }
}

impl From<bool> for GenericValue {
    fn from(v: bool) -> Self {
        GenericValue::Bool(v)
    }
}

impl From<i64> for GenericValue {
    fn from(v: i64) -> Self {
        GenericValue::Integer(v)
    }
}

impl From<f64> for GenericValue {
    fn from(v: f64) -> Self {
        GenericValue::Float(v)
    }
}

impl From<String> for GenericValue {
    fn from(v: String) -> Self {
        GenericValue::String(v)
    }
}

impl From<&str> for GenericValue {
    fn from(v: &str) -> Self {
        GenericValue::String(v.to_string())
    }
}

impl<T: Into<GenericValue>> From<Vec<T>> for GenericValue {
    fn from(v: Vec<T>) -> Self {
        GenericValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<DataObject> for GenericValue {
    fn from(v: DataObject) -> Self {
        GenericValue::Object(v)
    }
}

impl GenericValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GenericValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GenericValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GenericValue::Integer(n) => Some(*n),
            GenericValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GenericValue::Integer(n) => Some(*n as f64),
            GenericValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// A string-keyed map of [`GenericValue`]s — the engine's stand-in for a JSON object.
pub type DataObject = HashMap<String, GenericValue>;

/// One record of data flowing between nodes.
///
/// The specification describes an item as "an opaque string-keyed map";
/// this engine represents that directly as a [`DataObject`] rather than
/// wrapping it in a richer execution-data envelope (binary attachments,
/// lineage tracking) that no in-core operation needs.
pub type Item = DataObject;

/// Node configuration parameter values.
///
/// Distinct from [`GenericValue`] because a parameter tree may additionally
/// hold an unevaluated expression string (one beginning with `=`), which the
/// excluded expression-evaluation subsystem is responsible for resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeParameterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Array(Vec<NodeParameterValue>),
    Object(HashMap<String, NodeParameterValue>),
}

impl Default for NodeParameterValue {
    fn default() -> Self {
        NodeParameterValue::String(String::new())
    }
}

impl NodeParameterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeParameterValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            NodeParameterValue::Number(n) if *n >= 0.0 => Some(*n as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NodeParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A node's configuration parameter tree.
pub type NodeParameters = HashMap<String, NodeParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_value_from_conversions() {
        let v: GenericValue = "hello".into();
        assert_eq!(v, GenericValue::String("hello".to_string()));
        let v: GenericValue = 42i64.into();
        assert_eq!(v.as_i64(), Some(42));
    }

    #[test]
    fn node_parameter_value_accessors() {
        let v = NodeParameterValue::Number(3.0);
        assert_eq!(v.as_u64(), Some(3));
        let v = NodeParameterValue::String("retryOnFail".to_string());
        assert_eq!(v.as_str(), Some("retryOnFail"));
    }
}
