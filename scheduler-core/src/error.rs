//! Error taxonomy for the scheduling session.
//!
//! Mirrors the structured, per-node fit-failure reporting from `spec.md` §7:
//! fit/predicate failures are recoverable (the scheduler tries the next
//! node), statement errors abort the current job but not the session, and
//! snapshot errors abort the whole cycle.

use std::collections::HashMap;
use thiserror::Error;

/// A single node's reason for rejecting a task this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitError {
    pub node_id: String,
    pub reason: String,
}

impl FitError {
    pub fn new(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }
}

/// Aggregated per-node fit failures for one task, suitable for attaching to
/// a pod-group's status or a pod event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitErrors {
    pub by_node: HashMap<String, String>,
}

impl FitErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, err: FitError) {
        self.by_node.insert(err.node_id, err.reason);
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Human-readable explanation assembled from all recorded node reasons.
    pub fn explain(&self) -> String {
        if self.by_node.is_empty() {
            return "no candidate nodes were evaluated".to_string();
        }
        let mut nodes: Vec<&String> = self.by_node.keys().collect();
        nodes.sort();
        nodes
            .into_iter()
            .map(|n| format!("{n}: {}", self.by_node[n]))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A plugin predicate rejected the node. Conveyed the same way as a
    /// [`FitError`]; carried separately so callers can distinguish resource
    /// fit from policy rejection when they care to.
    #[error("predicate rejected node {node_id}: {reason}")]
    Predicate { node_id: String, reason: String },

    /// An allocate/evict operation could not be recorded onto a statement.
    /// The statement must be discarded; the session continues.
    #[error("statement error: {0}")]
    Statement(String),

    /// Fatal for the cycle; the session aborts cleanly.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
