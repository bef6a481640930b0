//! Gang admission and stale-gang eviction policy (`spec.md` §4.6).

use crate::podgroup::{GangPhase, PodGroupInfo};
use crate::statement::{CommitReport, Statement};

/// Outcome of attempting to admit one gang within a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GangAdmissionOutcome {
    pub phase: GangPhase,
    pub succeeded: usize,
    pub min_member: usize,
}

impl GangAdmissionOutcome {
    pub fn admitted(&self) -> bool {
        self.phase == GangPhase::Running
    }
}

/// Decide whether a gang is admitted, per `spec.md` §4.6: admitted only when
/// at least `min_member` of its tasks were successfully allocated or
/// pipelined within the same statement. If the count falls short the whole
/// statement is discarded — nothing in the gang is bound, not even the
/// tasks that individually succeeded.
///
/// Consumes the statement: callers must have already attempted every task's
/// allocate/pipeline against it before calling this.
pub fn finalize_gang_admission(
    statement: Statement<'_>,
    pod_group: &mut PodGroupInfo,
    succeeded: usize,
) -> (GangAdmissionOutcome, Option<CommitReport>) {
    let outcome = GangAdmissionOutcome {
        phase: if succeeded >= pod_group.min_member {
            GangPhase::Running
        } else {
            GangPhase::Unschedulable
        },
        succeeded,
        min_member: pod_group.min_member,
    };

    pod_group.phase = outcome.phase;

    if outcome.admitted() {
        (outcome, Some(statement.commit()))
    } else {
        statement.discard();
        (outcome, None)
    }
}

/// Update a running gang's staleness tracking given its current active-task
/// count. Returns `true` exactly once, the cycle the gang crosses from
/// "below `min_member` within grace" into `Stale` — the caller should evict
/// every active task with reason `StaleJob` on that transition.
pub fn evaluate_staleness(
    pod_group: &mut PodGroupInfo,
    active_count: usize,
    now_unix_seconds: i64,
    session_default_grace_seconds: u64,
) -> bool {
    if pod_group.phase != GangPhase::Running {
        return false;
    }

    if active_count >= pod_group.min_member {
        pod_group.below_min_member_since = None;
        return false;
    }

    let since = *pod_group.below_min_member_since.get_or_insert(now_unix_seconds);
    let grace = pod_group.effective_grace_seconds(session_default_grace_seconds) as i64;

    if now_unix_seconds.saturating_sub(since) >= grace {
        pod_group.phase = GangPhase::Stale;
        true
    } else {
        false
    }
}

/// Evict every active task of a now-stale gang, reason `StaleJob`
/// (`spec.md` §4.6). Best-effort: a task that fails to evict (e.g. already
/// releasing) is skipped rather than aborting the whole sweep.
pub fn evict_stale_gang(statement: &mut Statement<'_>, task_keys: &[String]) -> usize {
    let mut evicted = 0;
    for task_key in task_keys {
        if statement.evict(task_key, "StaleJob").is_ok() {
            evicted += 1;
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeInfo, ResourceVector};
    use crate::pod::{PodInfo, PodStatus, ResReq};
    use crate::snapshot::Snapshot;
    use std::collections::HashMap;

    fn three_pod_gang() -> (Snapshot, PodGroupInfo) {
        let mut snapshot = Snapshot::new();
        snapshot
            .nodes
            .insert("n1".to_string(), NodeInfo::new("n1", HashMap::new(), ResourceVector::new(64_000, 256_000, 4)));
        let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
        pg.phase = GangPhase::Pending;
        for i in 0..3 {
            let pod = PodInfo::new("default", format!("job-{i}"), "pg-1", ResReq {
                cpu_millis: 1000,
                ..Default::default()
            });
            pg.task_keys.push(pod.key());
            snapshot.pods.insert(pod.key(), pod);
        }
        (snapshot, pg)
    }

    #[test]
    fn gang_admitted_when_min_member_reached() {
        let (mut snapshot, mut pg) = three_pod_gang();
        let keys = pg.task_keys.clone();
        let mut succeeded = 0;
        {
            let mut stmt = Statement::open(&mut snapshot);
            for key in &keys {
                if stmt.allocate(key, "n1", None).is_ok() {
                    succeeded += 1;
                }
            }
            let (outcome, report) = finalize_gang_admission(stmt, &mut pg, succeeded);
            assert!(outcome.admitted());
            assert!(report.unwrap().binds.len() == 3);
        }
        assert_eq!(pg.phase, GangPhase::Running);
    }

    #[test]
    fn gang_discarded_when_below_min_member() {
        let (mut snapshot, mut pg) = three_pod_gang();
        let keys = pg.task_keys.clone();
        let mut succeeded = 0;
        {
            let mut stmt = Statement::open(&mut snapshot);
            // Only bind the first two; simulate the third failing to fit.
            for key in keys.iter().take(2) {
                if stmt.allocate(key, "n1", None).is_ok() {
                    succeeded += 1;
                }
            }
            let (outcome, report) = finalize_gang_admission(stmt, &mut pg, succeeded);
            assert!(!outcome.admitted());
            assert!(report.is_none());
        }
        assert_eq!(pg.phase, GangPhase::Unschedulable);
        for key in &keys {
            assert_eq!(snapshot.pods[key.as_str()].status, PodStatus::Pending);
        }
    }

    #[test]
    fn staleness_triggers_after_grace_period_elapses() {
        let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
        pg.phase = GangPhase::Running;

        assert!(!evaluate_staleness(&mut pg, 2, 1_000, 60));
        assert_eq!(pg.below_min_member_since, Some(1_000));
        assert!(!evaluate_staleness(&mut pg, 2, 1_030, 60));
        assert!(evaluate_staleness(&mut pg, 2, 1_061, 60));
        assert_eq!(pg.phase, GangPhase::Stale);
    }

    #[test]
    fn recovering_above_min_member_clears_staleness_tracking() {
        let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
        pg.phase = GangPhase::Running;
        evaluate_staleness(&mut pg, 2, 1_000, 60);
        assert!(pg.below_min_member_since.is_some());
        evaluate_staleness(&mut pg, 3, 1_010, 60);
        assert!(pg.below_min_member_since.is_none());
    }
}
