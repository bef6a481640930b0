//! Session — the top-level coordinator for one scheduling cycle
//! (`spec.md` §4.2). Owns the snapshot, plugin registrations, and (in spirit)
//! the event bus; the event bus itself has no cross-crate consumer in this
//! workspace, so it is represented as a Vec of emitted events a caller can
//! drain, not a running dispatcher.

use crate::error::{FitError, FitErrors, Result, SchedulerError};
use crate::fitting::{self, FittingCandidate, GpuOrderFn, PredicateFn};
use crate::node::ResourceVector;
use crate::pod::ResReq;
use crate::queue::QueueFairnessHooks;
use crate::snapshot::Snapshot;
use crate::statement::Statement;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Scores a node as a whole for a task, distinct from the GPU-level
/// `GpuOrderFn` in `fitting.rs`. Side-effect-free by construction: it takes
/// owned copies, not a snapshot reference, so it is safe to run under
/// `tokio::task::JoinSet` (`spec.md` §5).
pub type NodeScoreFn = Arc<dyn Fn(&crate::node::NodeInfo, &ResReq) -> i64 + Send + Sync>;

/// An event the session fired; a caller (the CLI harness, in this
/// workspace) drains these to render metrics/log lines (`spec.md` §6).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Bound { pod_key: String, node_name: String },
    Pipelined { pod_key: String, node_name: String },
    Evicted { pod_key: String, reason: String },
    Deallocated { pod_key: String },
}

/// Session-wide configuration the component design leaves to plugins/config
/// rather than hard-coding (`spec.md` §4.6, §6).
#[derive(Clone)]
pub struct SessionPolicy {
    pub default_staleness_grace_seconds: u64,
    pub node_pool_label: Option<String>,
    pub predicates: Vec<PredicateFn>,
    pub gpu_order: GpuOrderFn,
    pub node_score: NodeScoreFn,
    pub fairness: QueueFairnessHooks,
    /// Wall-clock session budget (`spec.md` §5); `None` means no deadline.
    pub cycle_budget: Option<Duration>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            default_staleness_grace_seconds: 120,
            node_pool_label: None,
            predicates: Vec::new(),
            gpu_order: fitting::default_gpu_order_fn(),
            node_score: Arc::new(|node, _req| node.idle.cpu_millis as i64),
            fairness: QueueFairnessHooks::default(),
            cycle_budget: None,
        }
    }
}

pub struct Session {
    pub snapshot: Snapshot,
    pub policy: SessionPolicy,
    events: Vec<SessionEvent>,
    opened_at: Instant,
}

impl Session {
    pub fn open(snapshot: Snapshot, policy: SessionPolicy) -> Self {
        Self {
            snapshot,
            policy,
            events: Vec::new(),
            opened_at: Instant::now(),
        }
    }

    /// Whether the session's wall-clock budget has expired (`spec.md` §5).
    /// On expiry the caller must discard any open statement and end the
    /// cycle.
    pub fn budget_expired(&self) -> bool {
        match self.policy.cycle_budget {
            Some(budget) => self.opened_at.elapsed() >= budget,
            None => false,
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// `FittingGPUs(node, pod) → ordered list of GPU slice identifiers`
    /// (`spec.md` §4.2). Builds the unscored candidate list via
    /// `fitting::gpu_filter`, then scores and orders it.
    pub fn fitting_gpus(&self, node_name: &str, request: &ResReq) -> Result<Vec<FittingCandidate>> {
        let node = self
            .snapshot
            .node(node_name)
            .ok_or_else(|| SchedulerError::Snapshot(format!("unknown node {node_name}")))?;
        let candidates = fitting::gpu_filter(node, request.gpu_memory_mb);
        Ok(fitting::order_gpu_candidates(node, request, candidates, &self.policy.gpu_order))
    }

    /// `FittingNode(task, node, writeDelta) → bool` (`spec.md` §4.2):
    /// combined resource fit + predicate chain. When `write_delta` is true
    /// and the node is rejected, the reason is recorded on the owning
    /// pod-group's fit-error map.
    pub fn fitting_node(
        &mut self,
        pod_key: &str,
        node_name: &str,
        write_delta: bool,
    ) -> Result<bool> {
        let pod = self
            .snapshot
            .pods
            .get(pod_key)
            .ok_or_else(|| SchedulerError::Snapshot(format!("unknown pod {pod_key}")))?
            .clone();
        let node = self
            .snapshot
            .nodes
            .get(node_name)
            .ok_or_else(|| SchedulerError::Snapshot(format!("unknown node {node_name}")))?
            .clone();

        let whole_request = pod.resource_request.as_resource_vector();
        let decision = fitting::is_task_allocatable_on_node(&node, &whole_request);
        let fit_reason = match decision {
            fitting::FitDecision::DoesNotFit => Some("insufficient idle or releasing resources".to_string()),
            _ => None,
        };

        let predicate_reason = if fit_reason.is_none() {
            fitting::run_predicates(&pod, &node, &self.policy.predicates).err()
        } else {
            None
        };

        let reason = fit_reason.or(predicate_reason);
        let fits = reason.is_none();

        if !fits && write_delta {
            if let Some(pg) = self.snapshot.pod_group_mut(&pod.pod_group_id) {
                pg.fit_errors
                    .entry(pod_key.to_string())
                    .or_insert_with(FitErrors::new)
                    .record(FitError::new(node_name, reason.unwrap_or_default()));
            }
        }

        Ok(fits)
    }

    /// `OrderedNodesByTask(nodes, task) → sorted nodes` (`spec.md` §4.2):
    /// pre-order hooks (node-pool label filter), parallel scoring via
    /// `tokio::task::JoinSet`, stable secondary sort by name.
    pub async fn ordered_nodes_by_task(&self, candidate_nodes: &[String], request: ResReq) -> Vec<String> {
        let pre_ordered: Vec<String> = candidate_nodes
            .iter()
            .filter(|name| self.passes_node_pool_filter(name))
            .cloned()
            .collect();

        let mut join_set: JoinSet<(String, i64)> = JoinSet::new();
        for name in pre_ordered {
            let Some(node) = self.snapshot.node(&name).cloned() else {
                continue;
            };
            let score_fn = self.policy.node_score.clone();
            join_set.spawn(async move { (node.name.clone(), score_fn(&node, &request)) });
        }

        let mut scored = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok(pair) = joined {
                scored.push(pair);
            }
        }

        scored.sort_by(|(name_a, score_a), (name_b, score_b)| {
            score_b.cmp(score_a).then_with(|| name_a.cmp(name_b))
        });
        scored.into_iter().map(|(name, _)| name).collect()
    }

    fn passes_node_pool_filter(&self, node_name: &str) -> bool {
        let Some(label) = &self.policy.node_pool_label else {
            return true;
        };
        self.snapshot
            .node(node_name)
            .map(|n| n.labels.contains_key(label))
            .unwrap_or(false)
    }

    /// `BindPod(pod)` (`spec.md` §4.2): transition to *Binding* and record
    /// the bind on the open statement.
    pub fn bind_pod(&mut self, statement: &mut Statement<'_>, pod_key: &str, node_name: &str, gpu_group: Option<String>) -> Result<()> {
        statement.allocate(pod_key, node_name, gpu_group)?;
        self.events.push(SessionEvent::Bound {
            pod_key: pod_key.to_string(),
            node_name: node_name.to_string(),
        });
        Ok(())
    }

    /// `Evict(pod, message, metadata)` (`spec.md` §4.2): transition to
    /// *Releasing*, return resources to the node's `Releasing` pool, fire a
    /// deallocate event.
    pub fn evict(&mut self, statement: &mut Statement<'_>, pod_key: &str, message: &str) -> Result<()> {
        statement.evict(pod_key, message)?;
        self.events.push(SessionEvent::Evicted {
            pod_key: pod_key.to_string(),
            reason: message.to_string(),
        });
        self.events.push(SessionEvent::Deallocated {
            pod_key: pod_key.to_string(),
        });
        Ok(())
    }

    /// `Statement() → Statement` (`spec.md` §4.2).
    pub fn statement(&mut self) -> Statement<'_> {
        Statement::open(&mut self.snapshot)
    }

    /// Convenience used by `gang.rs` callers: the cluster-wide idle vector
    /// across all nodes, for queue borrowable-headroom checks (`spec.md`
    /// §4.7).
    pub fn cluster_idle(&self) -> ResourceVector {
        self.snapshot
            .nodes
            .values()
            .fold(ResourceVector::default(), |acc, n| acc.add(&n.idle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeInfo, LABEL_GPU_COUNT, LABEL_GPU_MEMORY};
    use crate::pod::PodInfo;
    use std::collections::HashMap;

    fn fixture_session() -> Session {
        let mut snapshot = Snapshot::new();
        let mut labels = HashMap::new();
        labels.insert(LABEL_GPU_COUNT.to_string(), "1".to_string());
        labels.insert(LABEL_GPU_MEMORY.to_string(), "32600".to_string());
        snapshot
            .nodes
            .insert("n1".to_string(), NodeInfo::new("n1", labels, ResourceVector::new(64_000, 256_000, 100)));
        let pod = PodInfo::new("default", "a-0", "pg-1", ResReq {
            cpu_millis: 1000,
            memory_mb: 1000,
            gpu_memory_mb: 8000,
            num_gpu_devices: 1,
            ..Default::default()
        });
        snapshot.pods.insert(pod.key(), pod);
        Session::open(snapshot, SessionPolicy::default())
    }

    #[test]
    fn time_slicing_clamp_is_visible_through_session_snapshot() {
        let session = fixture_session();
        assert_eq!(session.snapshot.node("n1").unwrap().idle.gpus, 1);
    }

    #[test]
    fn fitting_node_records_fit_error_when_write_delta_set() {
        let mut session = fixture_session();
        session.snapshot.pod_groups.insert("pg-1".to_string(), crate::podgroup::PodGroupInfo::new("pg-1", "q1", 1));
        {
            let node = session.snapshot.node_mut("n1").unwrap();
            node.idle = ResourceVector::default();
            node.releasing = ResourceVector::default();
        }
        let fits = session.fitting_node("default/a-0", "n1", true).unwrap();
        assert!(!fits);
        let pg = session.snapshot.pod_group("pg-1").unwrap();
        assert!(!pg.fit_errors.is_empty());
    }

    #[tokio::test]
    async fn ordered_nodes_by_task_is_deterministic() {
        let session = fixture_session();
        let req = ResReq::default();
        let a = session.ordered_nodes_by_task(&["n1".to_string()], req).await;
        let b = session.ordered_nodes_by_task(&["n1".to_string()], req).await;
        assert_eq!(a, b);
    }
}
