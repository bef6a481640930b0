//! Action pipeline harness (`SPEC_FULL.md` §4.8). `spec.md` §2 names the
//! four actions — allocate, reclaim, preempt, consolidate — that drive a
//! session but leaves their own module contract implicit; this is the
//! minimal driver that iterates queues → pod-groups → tasks against the
//! `Session`/`Statement` API from §4.2–§4.6.

use crate::fitting::{self, FittingCandidate};
use crate::gang;
use crate::pod::ResReq;
use crate::podgroup::GangPhase;
use crate::selection::{self, select_fractional_gpus};
use crate::session::Session;
use priority_queue::PriorityQueue;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// What one action accomplished this cycle, for logging/metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub bound_tasks: usize,
    pub pipelined_tasks: usize,
    pub evicted_tasks: usize,
    pub admitted_gangs: Vec<String>,
    pub rejected_gangs: Vec<String>,
}

impl ActionResult {
    pub fn merge(&mut self, other: ActionResult) {
        self.bound_tasks += other.bound_tasks;
        self.pipelined_tasks += other.pipelined_tasks;
        self.evicted_tasks += other.evicted_tasks;
        self.admitted_gangs.extend(other.admitted_gangs);
        self.rejected_gangs.extend(other.rejected_gangs);
    }
}

pub trait Action {
    fn execute(&self, session: &mut Session) -> ActionResult;
}

/// Bridges the async `Session::ordered_nodes_by_task` scorer into a
/// synchronous call site, the same single-thread-runtime bridge the
/// teacher's dataplane engine uses to run async work from sync code
/// (`core/src/engine.rs`'s `Builder::new_current_thread().block_on(..)`).
/// `AllocateAction::execute` never runs inside its own tokio runtime, so
/// building one here per task is safe.
fn ordered_nodes_blocking(session: &Session, candidate_nodes: &[String], request: ResReq) -> Vec<String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start current-thread runtime for node scoring");
    rt.block_on(session.ordered_nodes_by_task(candidate_nodes, request))
}

/// For every task in a pod-group, resolve the subset of nodes it actually
/// fits against — scored and ordered via `Session::ordered_nodes_by_task`,
/// filtered through `Session::fitting_node` so the predicate chain runs and
/// rejections land in `PodGroupInfo.fit_errors` (`spec.md` §4.2/§4.3, §7).
/// Must run before any `Statement` is opened: both session calls need
/// exclusive-enough access to `session.snapshot` that they cannot interleave
/// with an open statement's borrow of it.
fn fit_node_order_per_task(session: &mut Session, task_keys: &[String], all_nodes: &[String]) -> HashMap<String, Vec<String>> {
    let mut fit_node_order = HashMap::new();

    for task_key in task_keys {
        let snapshot = session
            .snapshot
            .pods
            .get(task_key)
            .map(|pod| (pod.is_active(), pod.resource_request));
        let Some((is_active, request)) = snapshot else {
            continue;
        };
        if is_active {
            fit_node_order.insert(task_key.clone(), Vec::new());
            continue;
        }

        let ordered = ordered_nodes_blocking(session, all_nodes, request);
        let mut fitting = Vec::new();
        for node_name in ordered {
            if let Ok(true) = session.fitting_node(task_key, &node_name, true) {
                fitting.push(node_name);
            }
        }
        fit_node_order.insert(task_key.clone(), fitting);
    }

    fit_node_order
}

/// Try every task of one pod-group against the cluster's nodes, in a single
/// statement, then admit or reject the gang as a whole (`spec.md` §4.6).
fn try_admit_pod_group(session: &mut Session, pod_group_id: &str, all_nodes: &[String]) -> ActionResult {
    let mut result = ActionResult::default();

    let (min_member, task_keys) = match session.snapshot.pod_group(pod_group_id) {
        Some(pg) => (pg.min_member, pg.task_keys.clone()),
        None => return result,
    };

    let fit_node_order = fit_node_order_per_task(session, &task_keys, all_nodes);

    let (commit_report, pipelined) = {
        let mut statement = session.statement();
        let placements: Vec<Placement> = task_keys
            .iter()
            .filter_map(|task_key| {
                let node_order = fit_node_order.get(task_key).map(|v| v.as_slice()).unwrap_or(&[]);
                try_place_task(&mut statement, task_key, node_order).ok()
            })
            .collect();
        let pipelined = placements.iter().filter(|p| **p == Placement::Pipelined).count();

        if placements.len() >= min_member {
            (Some(statement.commit()), pipelined)
        } else {
            statement.discard();
            (None, 0)
        }
    };

    if let Some(pg) = session.snapshot.pod_group_mut(pod_group_id) {
        pg.phase = if commit_report.is_some() {
            GangPhase::Running
        } else {
            GangPhase::Unschedulable
        };
    }

    match commit_report {
        Some(report) => {
            result.bound_tasks += report.binds.len();
            result.pipelined_tasks += pipelined;
            result.admitted_gangs.push(pod_group_id.to_string());
        }
        None => result.rejected_gangs.push(pod_group_id.to_string()),
    }
    result
}

/// Whether a task placement bound immediately or only reserved releasing
/// capacity (`spec.md` §4.4 pipeline downgrade).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Bound,
    Pipelined,
}

/// Attempt to place one task on the first node in `node_order` where it
/// fits, selecting GPU groups if the request is fractional (`spec.md`
/// §4.3–§4.4). `node_order` is expected to already be fit-filtered by
/// `fit_node_order_per_task`; this still re-derives the idle-vs-releasing
/// fit decision per node because that decision also drives the bind/pipeline
/// choice, not just admission. An already-active task (e.g. re-evaluated
/// mid-cycle) counts as a success without re-allocating.
fn try_place_task(statement: &mut crate::statement::Statement<'_>, task_key: &str, node_order: &[String]) -> Result<Placement, ()> {
    let Some(pod) = statement.pod_snapshot(task_key) else {
        return Err(());
    };
    if pod.is_active() {
        return Ok(Placement::Bound);
    }
    let request = pod.resource_request;

    for node_name in node_order {
        let Some(node) = statement.node_snapshot(node_name) else {
            continue;
        };
        let whole_vector = request.as_resource_vector();
        let decision = fitting::is_task_allocatable_on_node(&node, &whole_vector);
        if matches!(decision, fitting::FitDecision::DoesNotFit) {
            continue;
        }
        let node_fits_idle = matches!(decision, fitting::FitDecision::FitsNow);

        if request.is_fractional_gpu() {
            let candidates: Vec<FittingCandidate> = fitting::gpu_filter(&node, request.gpu_memory_mb);
            let Some(selected) = select_fractional_gpus(&node, &candidates, &request, node_fits_idle) else {
                continue;
            };
            if selection::selection_is_pipeline_only(&selected) {
                if statement.pipeline_groups(task_key, node_name, &selected, true).is_ok() {
                    return Ok(Placement::Pipelined);
                }
            } else if statement.allocate_groups(task_key, node_name, &selected).is_ok() {
                return Ok(Placement::Bound);
            }
        } else if node_fits_idle {
            if statement.allocate(task_key, node_name, None).is_ok() {
                return Ok(Placement::Bound);
            }
        } else if statement.pipeline(task_key, node_name, None, true).is_ok() {
            return Ok(Placement::Pipelined);
        }
    }

    Err(())
}

/// The primary gang-admission path (`spec.md` §4.6): iterate queues in
/// `QueueOrderFn` order, pod-groups within a queue by priority (submission
/// time is out of scope for this harness — pod-groups carry no timestamp in
/// the data model).
pub struct AllocateAction;

impl Action for AllocateAction {
    fn execute(&self, session: &mut Session) -> ActionResult {
        let mut result = ActionResult::default();

        let mut queue_ids: Vec<String> = session.snapshot.queues.keys().cloned().collect();
        let queue_order = session.policy.fairness.queue_order.clone();
        queue_ids.sort_by(|a, b| {
            let qa = &session.snapshot.queues[a];
            let qb = &session.snapshot.queues[b];
            (queue_order)(qa, qb).then_with(|| a.cmp(b))
        });

        let mut node_order: Vec<String> = session.snapshot.nodes.keys().cloned().collect();
        node_order.sort();

        for queue_id in queue_ids {
            let mut queue: PriorityQueue<String, (i32, Reverse<String>)> = PriorityQueue::new();
            for pg in session.snapshot.pod_groups.values() {
                if pg.queue_id == queue_id && pg.phase == crate::podgroup::GangPhase::Pending {
                    queue.push(pg.id.clone(), (pg.priority_class, Reverse(pg.id.clone())));
                }
            }

            while let Some((pod_group_id, _)) = queue.pop() {
                let outcome = try_admit_pod_group(session, &pod_group_id, &node_order);
                result.merge(outcome);
            }
        }

        result
    }
}

/// Evict every active task of gangs that crossed into `Stale` this cycle
/// (`spec.md` §4.6). Staleness evaluation itself lives in `gang.rs`; this
/// action is the driver that calls it per pod-group and then evicts.
pub struct ReclaimAction {
    pub now_unix_seconds: i64,
}

impl Action for ReclaimAction {
    fn execute(&self, session: &mut Session) -> ActionResult {
        let mut result = ActionResult::default();
        let default_grace = session.policy.default_staleness_grace_seconds;

        // Precompute per-gang active counts via `Snapshot::active_task_count`
        // (filters Binding|Running) before taking a mutable borrow over
        // `pod_groups` below — `task_keys.len()` would also count pods that
        // were externally deleted or never started, masking real staleness.
        let active_counts: HashMap<String, usize> = session
            .snapshot
            .pod_groups
            .keys()
            .map(|id| (id.clone(), session.snapshot.active_task_count(id)))
            .collect();

        let mut newly_stale = Vec::new();
        for pod_group in session.snapshot.pod_groups.values_mut() {
            let active = active_counts.get(&pod_group.id).copied().unwrap_or(0);
            if gang::evaluate_staleness(pod_group, active, self.now_unix_seconds, default_grace) {
                newly_stale.push((pod_group.id.clone(), pod_group.task_keys.clone()));
            }
        }

        for (_, task_keys) in newly_stale {
            let mut statement = session.statement();
            let evicted = gang::evict_stale_gang(&mut statement, &task_keys);
            let _ = statement.commit();
            result.evicted_tasks += evicted;
        }

        result
    }
}

/// Preempt lower-priority jobs to satisfy a higher-priority job's demand.
/// Call-site and ordering only, per `spec.md` §4.7/§9 — actual preemption
/// scoring is plugin-defined and deliberately not implemented here.
pub struct PreemptAction;

impl Action for PreemptAction {
    fn execute(&self, session: &mut Session) -> ActionResult {
        let mut result = ActionResult::default();
        let hooks = session.policy.fairness.clone();
        let idle = session.cluster_idle();

        for queue in session.snapshot.queues.values() {
            if !(hooks.is_task_allocation_over_capacity)(&queue.allocated, &idle) {
                continue;
            }
            // A real preemption policy selects victims here; the core only
            // guarantees the call-site exists and runs in queue order.
        }

        result
    }
}

/// Consolidate fragmented allocations onto fewer nodes, bounded by
/// `max_consolidation_preemptees` (`SPEC_FULL.md` §6 CLI config). A bound of
/// zero disables consolidation entirely — the flag is still wired so the
/// config surface isn't dead.
pub struct ConsolidateAction {
    pub max_consolidation_preemptees: usize,
}

impl Action for ConsolidateAction {
    fn execute(&self, _session: &mut Session) -> ActionResult {
        if self.max_consolidation_preemptees == 0 {
            return ActionResult::default();
        }
        // Consolidation policy (bin-packing score, victim selection) is left
        // to a plugin; this placeholder never selects preemptees on its own.
        ActionResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeInfo, ResourceVector};
    use crate::pod::{PodInfo, PodStatus, ResReq};
    use crate::podgroup::{GangPhase, PodGroupInfo};
    use crate::queue::QueueInfo;
    use crate::session::SessionPolicy;
    use crate::snapshot::Snapshot;
    use std::collections::HashMap;

    fn session_with_gang(min_member: usize, free_vram: u64) -> Session {
        let mut snapshot = Snapshot::new();
        let mut labels = HashMap::new();
        labels.insert(crate::node::LABEL_GPU_MEMORY.to_string(), free_vram.to_string());
        snapshot
            .nodes
            .insert("n1".to_string(), NodeInfo::new("n1", labels, ResourceVector::new(64_000, 256_000, 1)));
        snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

        let mut pg = PodGroupInfo::new("pg-1", "q1", min_member);
        pg.phase = GangPhase::Pending;
        for (i, mb) in [4000u64, 8000, 8000].into_iter().enumerate() {
            let pod = PodInfo::new("default", format!("job-{i}"), "pg-1", ResReq {
                gpu_memory_mb: mb,
                num_gpu_devices: 1,
                ..Default::default()
            });
            pg.task_keys.push(pod.key());
            snapshot.pods.insert(pod.key(), pod);
        }
        snapshot.pod_groups.insert("pg-1".to_string(), pg);

        Session::open(snapshot, SessionPolicy::default())
    }

    #[test]
    fn allocate_action_admits_gang_when_cluster_has_room() {
        // Scenario B: free VRAM = 20000, requests {4000, 8000, 8000}.
        let mut session = session_with_gang(3, 20_000);
        let result = AllocateAction.execute(&mut session);
        assert_eq!(result.admitted_gangs, vec!["pg-1".to_string()]);
        assert!(result.rejected_gangs.is_empty());
    }

    #[test]
    fn allocate_action_rejects_gang_when_cluster_lacks_room() {
        // Scenario C: free VRAM = 15000, same requests; cannot fit all three.
        let mut session = session_with_gang(3, 15_000);
        let result = AllocateAction.execute(&mut session);
        assert!(result.admitted_gangs.is_empty());
        assert_eq!(result.rejected_gangs, vec!["pg-1".to_string()]);
        for pod in session.snapshot.pods.values() {
            assert_eq!(pod.status, PodStatus::Pending);
        }
    }

    #[test]
    fn consolidate_action_is_inert_when_bound_is_zero() {
        let mut session = session_with_gang(3, 20_000);
        let result = ConsolidateAction { max_consolidation_preemptees: 0 }.execute(&mut session);
        assert_eq!(result, ActionResult::default());
    }
}
