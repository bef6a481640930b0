//! Fractional-GPU selection algorithm (`spec.md` §4.4).

use crate::fitting::FittingCandidate;
use crate::node::NodeInfo;
use crate::pod::ResReq;
use uuid::Uuid;

/// One selected GPU-group tenancy for a task's multi-device fractional
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedGroup {
    pub group_id: String,
    /// This component lacked idle headroom (or the task didn't fit `Idle`
    /// overall); the whole selection downgrades to pipeline.
    pub releasing: bool,
    /// A fresh group minted for a whole-GPU slot, vs. an existing tenancy.
    pub newly_minted: bool,
}

/// Walk the ordered fitting list, accumulating up to `request.num_gpu_devices`
/// groups. Returns `None` if the walk exhausts the candidate list before
/// reaching that count — allocation fails outright, nothing is selected.
///
/// `node_fits_idle` is the result of `isTaskAllocatableOnNode` for the
/// task's whole-resource request (CPU/memory/whole-GPU dimensions); it
/// gates whether *any* component of this selection can be non-releasing,
/// per §4.4: "if ... the task is not globally allocatable on the node, mark
/// the selection releasing."
pub fn select_fractional_gpus(
    node: &NodeInfo,
    candidates: &[FittingCandidate],
    request: &ResReq,
    node_fits_idle: bool,
) -> Option<Vec<SelectedGroup>> {
    let n = request.num_gpu_devices.max(1);
    let mut selected = Vec::with_capacity(n as usize);

    // The fitting list's WholeGpuIndicator entries don't individually record
    // whether they're backed by idle or releasing capacity (the count is a
    // flat sum per `spec.md` §4.3 rule 2); consume idle capacity first, then
    // releasing, in list order.
    let mut idle_whole_remaining = node.idle_whole_gpus();
    let mut releasing_whole_remaining = node.releasing.gpus;

    for candidate in candidates {
        if selected.len() as u32 >= n {
            break;
        }

        match candidate {
            FittingCandidate::Group(id) => {
                let has_idle_headroom = node.group_has_idle_headroom(id, request.gpu_memory_mb);
                let releasing = !has_idle_headroom || !node_fits_idle;
                selected.push(SelectedGroup {
                    group_id: id.clone(),
                    releasing,
                    newly_minted: false,
                });
            }
            FittingCandidate::WholeGpuIndicator => {
                let group_id = Uuid::new_v4().to_string();
                let releasing = if idle_whole_remaining > 0 && node_fits_idle {
                    idle_whole_remaining -= 1;
                    false
                } else {
                    releasing_whole_remaining = releasing_whole_remaining.saturating_sub(1);
                    true
                };
                selected.push(SelectedGroup {
                    group_id,
                    releasing,
                    newly_minted: true,
                });
            }
        }
    }

    if (selected.len() as u32) < n {
        return None;
    }

    Some(selected)
}

/// Whether any component of a selection was releasing — if so, the whole
/// allocation downgrades to pipeline rather than binding this cycle
/// (`spec.md` §4.4).
pub fn selection_is_pipeline_only(selection: &[SelectedGroup]) -> bool {
    selection.iter().any(|s| s.releasing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ResourceVector, LABEL_GPU_COUNT, LABEL_GPU_MEMORY};
    use std::collections::HashMap;

    fn req(num_gpu_devices: u32, gpu_memory_mb: u64) -> ResReq {
        ResReq {
            gpu_memory_mb,
            num_gpu_devices,
            ..Default::default()
        }
    }

    #[test]
    fn single_device_fits_into_existing_group() {
        let mut labels = HashMap::new();
        labels.insert(LABEL_GPU_MEMORY.to_string(), "32600".to_string());
        let mut node = NodeInfo::new("n1", labels, ResourceVector::new(64_000, 256_000, 1));
        node.record_group_usage("g1", 8000, false);

        let candidates = vec![FittingCandidate::Group("g1".to_string())];
        let selected = select_fractional_gpus(&node, &candidates, &req(1, 8000), true).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(!selected[0].releasing);
        assert!(!selected[0].newly_minted);
    }

    #[test]
    fn insufficient_candidates_fails_the_whole_selection() {
        let node = NodeInfo::new("n1", HashMap::new(), ResourceVector::new(64_000, 256_000, 1));
        let candidates = vec![FittingCandidate::WholeGpuIndicator];
        assert!(select_fractional_gpus(&node, &candidates, &req(2, 8000), true).is_none());
    }

    #[test]
    fn whole_gpu_sentinel_mints_fresh_group_when_idle() {
        let mut labels = HashMap::new();
        labels.insert(LABEL_GPU_COUNT.to_string(), "1".to_string());
        labels.insert(LABEL_GPU_MEMORY.to_string(), "32600".to_string());
        let node = NodeInfo::new("n1", labels, ResourceVector::new(1, 256_000, 1));
        let candidates = vec![FittingCandidate::WholeGpuIndicator];
        let selected = select_fractional_gpus(&node, &candidates, &req(1, 8000), true).unwrap();
        assert!(selected[0].newly_minted);
        assert!(!selected[0].releasing);
        assert!(!selection_is_pipeline_only(&selected));
    }

    #[test]
    fn group_without_idle_headroom_downgrades_to_pipeline() {
        let mut labels = HashMap::new();
        labels.insert(LABEL_GPU_MEMORY.to_string(), "32600".to_string());
        let mut node = NodeInfo::new("n1", labels, ResourceVector::new(64_000, 256_000, 1));
        node.record_group_usage("g1", 30_000, false); // only 2600 MiB idle headroom left
        let candidates = vec![FittingCandidate::Group("g1".to_string())];
        let selected = select_fractional_gpus(&node, &candidates, &req(1, 20_000), true).unwrap();
        assert!(selected[0].releasing);
        assert!(selection_is_pipeline_only(&selected));
    }
}
