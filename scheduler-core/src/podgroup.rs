//! PodGroupInfo — the gang.

use crate::error::FitErrors;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GangPhase {
    /// Not yet evaluated this cycle, or insufficient members allocatable.
    Pending,
    /// At least `min_member` tasks were simultaneously allocatable/bound.
    Running,
    /// Every task bound but the gang never reaches `min_member` running
    /// again after the staleness grace period — evict-all.
    Stale,
    /// Admission failed and the allocator could not reach `min_member`
    /// within the statement; nothing was bound.
    Unschedulable,
}

/// The gang. A pod-group is schedulable this cycle iff at least `min_member`
/// of its tasks are simultaneously allocatable; if fewer than `min_member`
/// are active past the staleness grace period, it becomes stale and all
/// allocated tasks must be evicted (`spec.md` §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodGroupInfo {
    pub id: String,
    pub queue_id: String,
    pub priority_class: i32,
    pub min_member: usize,
    pub task_keys: Vec<String>,
    pub phase: GangPhase,
    /// Staleness grace period override for this gang; `None` falls back to
    /// the session-wide default (`spec.md` §4.6).
    pub staleness_grace_seconds: Option<u64>,
    /// Wall-clock (seconds since epoch) since the active count first fell
    /// below `min_member` while running. `None` while the gang has enough
    /// active members.
    pub below_min_member_since: Option<i64>,
    #[serde(skip)]
    pub fit_errors: HashMap<String, FitErrors>,
}

impl PodGroupInfo {
    pub fn new(id: impl Into<String>, queue_id: impl Into<String>, min_member: usize) -> Self {
        Self {
            id: id.into(),
            queue_id: queue_id.into(),
            priority_class: 0,
            min_member,
            task_keys: Vec::new(),
            phase: GangPhase::Pending,
            staleness_grace_seconds: None,
            below_min_member_since: None,
            fit_errors: HashMap::new(),
        }
    }

    /// Human-readable per-task-per-node explanation, assembled from the
    /// `FitErrors` map as `spec.md` §7 requires for user-visible failures.
    pub fn status_message(&self) -> String {
        if self.fit_errors.is_empty() {
            return "Unschedulable".to_string();
        }
        let mut tasks: Vec<&String> = self.fit_errors.keys().collect();
        tasks.sort();
        let detail = tasks
            .into_iter()
            .map(|t| format!("{t}: {}", self.fit_errors[t].explain()))
            .collect::<Vec<_>>()
            .join(" | ");
        format!("Unschedulable: {detail}")
    }

    /// Grace period in effect for this gang (its own override, else the
    /// session-wide default).
    pub fn effective_grace_seconds(&self, session_default: u64) -> u64 {
        self.staleness_grace_seconds.unwrap_or(session_default)
    }
}
