//! QueueInfo — a hierarchical resource queue, and the pluggable fairness
//! hooks the session exposes (`spec.md` §3, §4.7).
//!
//! The core only defines the call-sites and ordering guarantees; actual
//! fairness math (proportional, dominant-resource-fairness, strict quotas)
//! is plugin-defined, per the Open Question in `spec.md` §9. The default
//! hooks implement the simplest possible policy — deserved plus unused
//! borrowable headroom — so the session is usable without a plugin, not
//! because that policy is prescribed.

use crate::node::ResourceVector;
use crate::podgroup::PodGroupInfo;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueInfo {
    pub id: String,
    pub parent: Option<String>,
    pub is_leaf: bool,
    pub deserved: ResourceVector,
    pub fair_share: ResourceVector,
    pub allocated: ResourceVector,
    /// Whether this queue may borrow idle capacity beyond `deserved` when
    /// the cluster has headroom.
    pub over_quota_borrowing: bool,
}

impl QueueInfo {
    pub fn new_leaf(id: impl Into<String>, deserved: ResourceVector) -> Self {
        Self {
            id: id.into(),
            parent: None,
            is_leaf: true,
            deserved,
            fair_share: deserved,
            allocated: ResourceVector::default(),
            over_quota_borrowing: true,
        }
    }

    /// Invariant from `spec.md` §3: `allocated <= deserved + borrowable
    /// headroom`. With borrowing disabled the headroom is zero.
    pub fn borrowable_headroom(&self, cluster_idle: &ResourceVector) -> ResourceVector {
        if self.over_quota_borrowing {
            *cluster_idle
        } else {
            ResourceVector::default()
        }
    }

    pub fn is_over_quota(&self, cluster_idle: &ResourceVector) -> bool {
        let headroom = self.borrowable_headroom(cluster_idle);
        let cap = self.deserved.add(&headroom);
        !cap.covers(&self.allocated)
    }
}

pub type QueueOrderFn = Arc<dyn Fn(&QueueInfo, &QueueInfo) -> Ordering + Send + Sync>;
pub type GetQueueAllocatedResourcesFn = Arc<dyn Fn(&QueueInfo) -> ResourceVector + Send + Sync>;
pub type GetQueueDeservedResourcesFn = Arc<dyn Fn(&QueueInfo) -> ResourceVector + Send + Sync>;
pub type GetQueueFairShareFn = Arc<dyn Fn(&QueueInfo) -> ResourceVector + Send + Sync>;
pub type IsJobOverCapacityFn = Arc<dyn Fn(&PodGroupInfo, &QueueInfo) -> bool + Send + Sync>;
pub type IsNonPreemptibleJobOverQueueQuotaFn = Arc<dyn Fn(&PodGroupInfo, &QueueInfo) -> bool + Send + Sync>;
pub type IsTaskAllocationOnNodeOverCapacityFn =
    Arc<dyn Fn(&ResourceVector, &ResourceVector) -> bool + Send + Sync>;

/// Bundle of the pluggable fairness hooks a [`crate::session::Session`]
/// exposes. Plugins register capabilities (functions), not types — there is
/// no plugin base trait (`spec.md` §9).
#[derive(Clone)]
pub struct QueueFairnessHooks {
    pub queue_order: QueueOrderFn,
    pub get_allocated: GetQueueAllocatedResourcesFn,
    pub get_deserved: GetQueueDeservedResourcesFn,
    pub get_fair_share: GetQueueFairShareFn,
    pub is_job_over_capacity: IsJobOverCapacityFn,
    pub is_non_preemptible_over_quota: IsNonPreemptibleJobOverQueueQuotaFn,
    pub is_task_allocation_over_capacity: IsTaskAllocationOnNodeOverCapacityFn,
}

impl Default for QueueFairnessHooks {
    fn default() -> Self {
        Self {
            queue_order: Arc::new(|a, b| {
                // Deterministic default: by deserved CPU share desc, then id.
                b.deserved
                    .cpu_millis
                    .cmp(&a.deserved.cpu_millis)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            get_allocated: Arc::new(|q| q.allocated),
            get_deserved: Arc::new(|q| q.deserved),
            get_fair_share: Arc::new(|q| q.fair_share),
            is_job_over_capacity: Arc::new(|_pg, _q| false),
            is_non_preemptible_over_quota: Arc::new(|_pg, q| q.allocated.covers(&q.deserved) && !q.deserved.covers(&q.allocated)),
            is_task_allocation_over_capacity: Arc::new(|allocated, deserved| !deserved.covers(allocated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowing_disabled_means_no_headroom() {
        let mut q = QueueInfo::new_leaf("q1", ResourceVector::new(1000, 1000, 1));
        q.over_quota_borrowing = false;
        let idle = ResourceVector::new(5000, 5000, 5);
        assert_eq!(q.borrowable_headroom(&idle), ResourceVector::default());
    }

    #[test]
    fn default_queue_order_is_deterministic() {
        let hooks = QueueFairnessHooks::default();
        let a = QueueInfo::new_leaf("a", ResourceVector::new(100, 0, 0));
        let b = QueueInfo::new_leaf("b", ResourceVector::new(100, 0, 0));
        assert_eq!((hooks.queue_order)(&a, &b), Ordering::Less);
    }
}
