//! # wf-graph
//!
//! Core graph model for the workflow execution engine: [`Workflow`], [`Node`],
//! and [`connection::Connection`], plus the derived connection indices and
//! traversal utilities the executor builds on.

pub mod connection;
pub mod data;
pub mod error;
pub mod execution;
pub mod node;
pub mod rename;
pub mod workflow;

pub use connection::*;
pub use data::*;
pub use error::*;
pub use execution::*;
pub use node::*;
pub use rename::rename_node;
pub use workflow::*;
