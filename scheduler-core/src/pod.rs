//! PodInfo — a schedulable unit, and its resource request.

use crate::node::ResourceVector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A task's resource request: CPU, memory, whole GPU count, per-GPU memory,
/// and number of GPU devices. Mutual exclusion between whole-GPU requests
/// and `gpu_memory_mb` requests is enforced by the webhook (external to the
/// core); this struct assumes well-formed requests per `spec.md` §6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResReq {
    pub cpu_millis: u64,
    pub memory_mb: u64,
    /// Whole GPU devices requested (mutually exclusive with `gpu_memory_mb`).
    pub gpu_count: u32,
    /// Per-GPU VRAM request in MiB for fractional/shared-GPU allocation.
    /// A value of 0 with `num_gpu_devices > 0` is treated as a whole-GPU
    /// request per `spec.md` §4.4 edge case (ii).
    pub gpu_memory_mb: u64,
    /// Number of GPU devices (whole or fractional slices) this task needs.
    pub num_gpu_devices: u32,
}

impl ResReq {
    /// True when this request is for fractional/shared GPU memory rather
    /// than whole devices.
    pub fn is_fractional_gpu(&self) -> bool {
        self.gpu_memory_mb > 0
    }

    /// Whole-resource view used for node-level (non-GPU-group) accounting:
    /// CPU, memory, and whole-GPU count. Fractional GPU memory is accounted
    /// separately via the node's per-group maps.
    pub fn as_resource_vector(&self) -> ResourceVector {
        ResourceVector::new(self.cpu_millis, self.memory_mb, self.gpu_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodStatus {
    Pending,
    Binding,
    Releasing,
    Running,
    Succeeded,
    Failed,
}

/// A schedulable unit. Constructed from the orchestrator's pod object;
/// mutated only by the [`crate::statement::Statement`] (bind, evict);
/// destroyed when the snapshot closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub pod_group_id: String,
    pub status: PodStatus,
    pub node_name: Option<String>,
    pub resource_request: ResReq,
    /// Opaque GPU-group tenancy ids this pod belongs to once allocated on a
    /// shared GPU. Empty for whole-GPU allocations (those mint a fresh group
    /// id but do not need the pod to remember more than one).
    pub gpu_groups: HashSet<String>,
}

impl PodInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, pod_group_id: impl Into<String>, resource_request: ResReq) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            pod_group_id: pod_group_id.into(),
            status: PodStatus::Pending,
            node_name: None,
            resource_request,
            gpu_groups: HashSet::new(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, PodStatus::Binding | PodStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_request_detection() {
        let req = ResReq {
            gpu_memory_mb: 8000,
            num_gpu_devices: 1,
            ..Default::default()
        };
        assert!(req.is_fractional_gpu());

        let whole = ResReq {
            gpu_count: 1,
            num_gpu_devices: 1,
            ..Default::default()
        };
        assert!(!whole.is_fractional_gpu());
    }

    #[test]
    fn pod_key_is_namespaced() {
        let pod = PodInfo::new("default", "job-a-0", "pg-1", ResReq::default());
        assert_eq!(pod.key(), "default/job-a-0");
    }
}
