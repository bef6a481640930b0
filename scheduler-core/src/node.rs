//! NodeInfo — a node's scheduling state, including the GPU time-slicing
//! correction described in `spec.md` §3 and §9.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A CPU/memory/whole-GPU resource vector. Used for `Allocatable`, `Idle`,
/// `Used`, and `Releasing` per `spec.md` §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceVector {
    pub cpu_millis: u64,
    pub memory_mb: u64,
    pub gpus: u32,
}

impl ResourceVector {
    pub fn new(cpu_millis: u64, memory_mb: u64, gpus: u32) -> Self {
        Self {
            cpu_millis,
            memory_mb,
            gpus,
        }
    }

    pub fn saturating_sub(&self, other: &ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_mb: self.memory_mb.saturating_sub(other.memory_mb),
            gpus: self.gpus.saturating_sub(other.gpus),
        }
    }

    pub fn add(&self, other: &ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_millis: self.cpu_millis + other.cpu_millis,
            memory_mb: self.memory_mb + other.memory_mb,
            gpus: self.gpus + other.gpus,
        }
    }

    /// Componentwise `self >= other`.
    pub fn covers(&self, other: &ResourceVector) -> bool {
        self.cpu_millis >= other.cpu_millis
            && self.memory_mb >= other.memory_mb
            && self.gpus >= other.gpus
    }
}

/// A compute node in the cluster. Rebuilt per snapshot; the time-slicing
/// clamp is applied exactly once, at construction, per the critical
/// invariant in `spec.md` §3/§9 — applying it anywhere else (e.g. at filter
/// call-sites) leaks phantom idle GPU slots after the first shared
/// allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub labels: HashMap<String, String>,

    pub allocatable: ResourceVector,
    pub idle: ResourceVector,
    pub used: ResourceVector,
    pub releasing: ResourceVector,

    /// Per-GPU VRAM capacity in MiB, from the node's `gpu.memory` label.
    /// `None` means the node is GPU-ineligible: excluded from
    /// GPU-requesting filters, not fatal (`spec.md` §4.1).
    pub memory_of_every_gpu_on_node: Option<u64>,
    /// Physical GPU count, from the node's `gpu.count` label.
    pub physical_gpu_count: Option<u32>,

    /// GPU group id -> MiB, committed usage of running shared-GPU pods.
    pub used_shared_gpus_memory: HashMap<String, u64>,
    /// GPU group id -> MiB, total allocated (used + pipelined-in) this cycle.
    pub allocated_shared_gpus_memory: HashMap<String, u64>,
    /// GPU group id -> MiB, usage that is scheduled to be freed.
    pub releasing_shared_gpus_memory: HashMap<String, u64>,
}

/// Label keys interpreted by the snapshot builder (`spec.md` §6).
pub const LABEL_GPU_MEMORY: &str = "gpu.memory";
pub const LABEL_GPU_COUNT: &str = "gpu.count";

impl NodeInfo {
    /// Construct a node from its allocatable resources and labels. Applies
    /// the time-slicing clamp immediately: if `allocatable.gpus >
    /// physical_gpu_count > 0`, `idle.gpus` is clamped to
    /// `physical_gpu_count` before any other mutation can observe it.
    pub fn new(name: impl Into<String>, labels: HashMap<String, String>, allocatable: ResourceVector) -> Self {
        let memory_of_every_gpu_on_node = labels.get(LABEL_GPU_MEMORY).and_then(|v| v.parse::<u64>().ok());
        let physical_gpu_count = labels.get(LABEL_GPU_COUNT).and_then(|v| v.parse::<u32>().ok());

        let mut idle = allocatable;
        if let Some(physical) = physical_gpu_count {
            if physical > 0 && allocatable.gpus > physical {
                idle.gpus = physical;
            }
        }

        Self {
            name: name.into(),
            labels,
            allocatable,
            idle,
            used: ResourceVector::default(),
            releasing: ResourceVector::default(),
            memory_of_every_gpu_on_node,
            physical_gpu_count,
            used_shared_gpus_memory: HashMap::new(),
            allocated_shared_gpus_memory: HashMap::new(),
            releasing_shared_gpus_memory: HashMap::new(),
        }
    }

    /// A node has GPU resources at all (non-zero allocatable GPU count or
    /// per-GPU memory already tracked) but is missing the label required
    /// for VRAM accounting.
    pub fn is_gpu_ineligible(&self) -> bool {
        self.allocatable.gpus > 0 && self.memory_of_every_gpu_on_node.is_none()
    }

    /// Account a bound pod's request against `Idle`/`Used` at snapshot
    /// construction time (`spec.md` §4.1 node construction rule 2). Whole-GPU
    /// accounting only; fractional accounting goes through
    /// `record_group_usage`.
    pub fn account_bound(&mut self, request: &ResourceVector) {
        self.idle = self.idle.saturating_sub(request);
        self.used = self.used.add(request);
    }

    /// Account a bound pod's request as scheduled-to-be-freed (`Releasing`
    /// state) rather than `Used`.
    pub fn account_releasing(&mut self, request: &ResourceVector) {
        self.idle = self.idle.saturating_sub(request);
        self.releasing = self.releasing.add(request);
    }

    /// Reserve capacity out of the `Releasing` pool for a pipelined
    /// allocation: the task doesn't actually bind this cycle, but the
    /// capacity it will occupy once the releaser vacates must not be handed
    /// to a second task in the same cycle (`spec.md` §4.3/§4.5).
    pub fn account_pipelined(&mut self, request: &ResourceVector) {
        self.releasing = self.releasing.saturating_sub(request);
        self.used = self.used.add(request);
    }

    /// Move a running pod's whole-resource footprint from `Used` to
    /// `Releasing` on `Statement::Evict` — still accounted against the node,
    /// but scheduled to be freed.
    pub fn mark_releasing(&mut self, request: &ResourceVector) {
        self.used = self.used.saturating_sub(request);
        self.releasing = self.releasing.add(request);
    }

    /// Group-scoped equivalent of [`Self::mark_releasing`]: marks `mb` of an
    /// existing group's committed usage as scheduled to be freed, without
    /// reducing `used_shared_gpus_memory` (the group is still a tenant until
    /// it actually vacates).
    pub fn mark_group_releasing(&mut self, group: &str, mb: u64) {
        *self.releasing_shared_gpus_memory.entry(group.to_string()).or_insert(0) += mb;
    }

    /// Record a shared-GPU tenant's committed usage against a group, used
    /// while building the snapshot from running pods' annotations (`spec.md`
    /// §4.1 rule 4).
    pub fn record_group_usage(&mut self, group: &str, mb: u64, releasing: bool) {
        *self.used_shared_gpus_memory.entry(group.to_string()).or_insert(0) += mb;
        *self.allocated_shared_gpus_memory.entry(group.to_string()).or_insert(0) += mb;
        if releasing {
            *self.releasing_shared_gpus_memory.entry(group.to_string()).or_insert(0) += mb;
        }
    }

    /// `Idle + Releasing` resource fit check for whole-resource requests
    /// (`spec.md` §4.3). Returns `(fits_idle, fits_with_releasing)`.
    pub fn fit_against_idle_and_releasing(&self, request: &ResourceVector) -> (bool, bool) {
        let fits_idle = self.idle.covers(request);
        let fits_with_releasing = self.idle.add(&self.releasing).covers(request);
        (fits_idle, fits_with_releasing)
    }

    /// Invariant 1 from `spec.md` §8: committed VRAM across all groups never
    /// exceeds physical capacity.
    pub fn total_shared_gpu_capacity_mb(&self) -> u64 {
        match (self.physical_gpu_count, self.memory_of_every_gpu_on_node) {
            (Some(physical), Some(per_gpu)) => physical as u64 * per_gpu,
            _ => 0,
        }
    }

    pub fn total_allocated_shared_gpu_mb(&self) -> u64 {
        self.allocated_shared_gpus_memory.values().sum()
    }

    /// Fit-on-group test from `spec.md` §4.3: the group has a committed
    /// tenant (`used != 0`), isn't entirely vacating (`NOT all-released`),
    /// and has enough headroom counting releasing memory as available.
    pub fn is_task_fit_on_gpu_group(&self, group: &str, request_mb: u64) -> bool {
        let Some(total) = self.memory_of_every_gpu_on_node else {
            return false;
        };
        let used = *self.used_shared_gpus_memory.get(group).unwrap_or(&0);
        if used == 0 {
            return false;
        }
        let releasing = *self.releasing_shared_gpus_memory.get(group).unwrap_or(&0);
        let all_released = used == releasing;
        if all_released {
            return false;
        }
        let allocated = *self.allocated_shared_gpus_memory.get(group).unwrap_or(&0);
        total.saturating_sub(allocated).saturating_add(releasing) >= request_mb
    }

    /// Idle (non-releasing) headroom on an existing group: whether this
    /// group can absorb the request *right now* without waiting on a
    /// releaser.
    pub fn group_has_idle_headroom(&self, group: &str, request_mb: u64) -> bool {
        let Some(total) = self.memory_of_every_gpu_on_node else {
            return false;
        };
        let allocated = *self.allocated_shared_gpus_memory.get(group).unwrap_or(&0);
        total.saturating_sub(allocated) >= request_mb
    }

    /// Consume one whole-GPU slot to mint a fresh shared-GPU group
    /// (`spec.md` §4.4 `WholeGpuIndicator` case). Must be called exactly
    /// once per newly minted group, at first tenant — later tenants of the
    /// same group join via `record_group_usage` alone, which must not touch
    /// `idle`/`releasing` again (`spec.md` §9: re-decrementing here is
    /// exactly the "phantom idle GPU" bug the time-slicing note warns
    /// about).
    pub fn consume_whole_gpu_slot(&mut self, from_idle: bool) {
        if from_idle {
            self.idle.gpus = self.idle.gpus.saturating_sub(1);
        } else {
            self.releasing.gpus = self.releasing.gpus.saturating_sub(1);
        }
    }

    /// Number of idle-or-releasing whole GPU slots available for the
    /// `WholeGpuIndicator` sentinel, post time-slicing clamp (`spec.md`
    /// §4.3 rule 2).
    pub fn idle_or_releasing_whole_gpus(&self) -> u32 {
        self.idle.gpus + self.releasing.gpus
    }

    pub fn idle_whole_gpus(&self) -> u32 {
        self.idle.gpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_node(allocatable_gpus: u32, gpu_count_label: Option<&str>, gpu_memory_label: Option<&str>) -> NodeInfo {
        let mut labels = HashMap::new();
        if let Some(c) = gpu_count_label {
            labels.insert(LABEL_GPU_COUNT.to_string(), c.to_string());
        }
        if let Some(m) = gpu_memory_label {
            labels.insert(LABEL_GPU_MEMORY.to_string(), m.to_string());
        }
        NodeInfo::new(
            "node-1",
            labels,
            ResourceVector::new(64_000, 512_000, allocatable_gpus),
        )
    }

    /// `spec.md` §8 invariant 2 / Scenario A: advertised 100 logical GPUs
    /// backed by 1 physical GPU must clamp idle to 1, not 100.
    #[test]
    fn time_slicing_clamp_applies_at_construction() {
        let node = labeled_node(100, Some("1"), Some("32600"));
        assert_eq!(node.idle.gpus, 1);
        assert_eq!(node.idle_whole_gpus(), 1);
    }

    #[test]
    fn no_clamp_when_physical_matches_or_label_absent() {
        let node = labeled_node(4, Some("4"), Some("32600"));
        assert_eq!(node.idle.gpus, 4);

        let node = labeled_node(4, None, Some("32600"));
        assert_eq!(node.idle.gpus, 4);
    }

    #[test]
    fn missing_gpu_memory_label_marks_gpu_ineligible() {
        let node = labeled_node(4, Some("4"), None);
        assert!(node.is_gpu_ineligible());
    }

    #[test]
    fn group_fit_requires_existing_tenant_and_headroom() {
        let mut node = labeled_node(100, Some("1"), Some("32600"));
        // No tenant yet: not fit.
        assert!(!node.is_task_fit_on_gpu_group("g1", 8000));

        node.record_group_usage("g1", 8000, false);
        assert!(node.is_task_fit_on_gpu_group("g1", 24600));
        assert!(!node.is_task_fit_on_gpu_group("g1", 24601));
    }

    #[test]
    fn all_released_group_is_not_a_fit_target() {
        let mut node = labeled_node(100, Some("1"), Some("32600"));
        node.record_group_usage("g1", 8000, true);
        assert!(!node.is_task_fit_on_gpu_group("g1", 1000));
    }
}
