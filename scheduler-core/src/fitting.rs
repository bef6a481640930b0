//! Fitting pipeline: node-level fit, the GPU filter, scoring, and the
//! predicate chain (`spec.md` §4.3).

use crate::node::{NodeInfo, ResourceVector};
use crate::pod::{PodInfo, ResReq};
use std::sync::Arc;

/// Outcome of a whole-resource fit check against a node's `Idle` and
/// `Releasing` vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitDecision {
    /// Fits against `Idle` alone — can bind immediately.
    FitsNow,
    /// Fits only once `Releasing` resources are counted — downgrade to
    /// pipeline (`spec.md` §4.3).
    FitsWithReleasing,
    DoesNotFit,
}

/// `isTaskAllocatableOnNode` from `spec.md` §4.3: does the task's request
/// fit into `Idle + Releasing` for all resource dimensions, and if so, does
/// it already fit in `Idle` alone?
pub fn is_task_allocatable_on_node(node: &NodeInfo, request: &ResourceVector) -> FitDecision {
    let (fits_idle, fits_with_releasing) = node.fit_against_idle_and_releasing(request);
    if fits_idle {
        FitDecision::FitsNow
    } else if fits_with_releasing {
        FitDecision::FitsWithReleasing
    } else {
        FitDecision::DoesNotFit
    }
}

/// A candidate in the GPU fitting list: either an existing shared-GPU
/// tenancy group, or the reserved sentinel meaning "an unallocated physical
/// GPU slot is available" (`spec.md` GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FittingCandidate {
    Group(String),
    WholeGpuIndicator,
}

impl FittingCandidate {
    /// Deterministic tie-break key. Real groups sort by their own id; the
    /// sentinel sorts after every real group id so ties between multiple
    /// whole-GPU sentinels fall back to stable input order.
    fn tie_break_key(&self) -> &str {
        match self {
            FittingCandidate::Group(id) => id,
            FittingCandidate::WholeGpuIndicator => "\u{10FFFF}",
        }
    }
}

/// Build the unscored GPU fitting list for a task's per-GPU-memory request
/// on one node, per `spec.md` §4.3:
///
/// 1. every existing shared-GPU group for which `is_task_fit_on_gpu_group`
///    holds;
/// 2. the `WholeGpuIndicator` sentinel, once per idle-or-releasing whole
///    GPU (correct in count only after the time-slicing clamp).
pub fn gpu_filter(node: &NodeInfo, request_mb: u64) -> Vec<FittingCandidate> {
    let mut groups: Vec<&String> = node.used_shared_gpus_memory.keys().collect();
    groups.sort();

    let mut candidates: Vec<FittingCandidate> = groups
        .into_iter()
        .filter(|g| node.is_task_fit_on_gpu_group(g, request_mb))
        .map(|g| FittingCandidate::Group(g.clone()))
        .collect();

    for _ in 0..node.idle_or_releasing_whole_gpus() {
        candidates.push(FittingCandidate::WholeGpuIndicator);
    }

    candidates
}

/// Scoring function registered by a GPU-order plugin. The core does not
/// assume monotonicity or any particular formula (`spec.md` §9 Open
/// Questions) — this is a call-site, not a policy.
pub type GpuOrderFn = Arc<dyn Fn(&NodeInfo, &FittingCandidate, &ResReq) -> i64 + Send + Sync>;

/// Score and order GPU candidates: descending score, ties broken by name
/// (`spec.md` §8 invariant 5 — `FittingGPUs` is deterministic given
/// identical snapshot and plugin scores).
pub fn order_gpu_candidates(
    node: &NodeInfo,
    request: &ResReq,
    candidates: Vec<FittingCandidate>,
    order_fn: &GpuOrderFn,
) -> Vec<FittingCandidate> {
    let mut scored: Vec<(i64, FittingCandidate)> = candidates
        .into_iter()
        .map(|c| {
            let score = order_fn(node, &c, request);
            (score, c)
        })
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| a.tie_break_key().cmp(b.tie_break_key()))
    });

    scored.into_iter().map(|(_, c)| c).collect()
}

/// Default GPU-order scorer: best-fit packing onto existing groups (more
/// idle headroom on a shared group scores higher, favoring reuse), whole-GPU
/// sentinels score a fixed baseline. This is an illustrative default, not a
/// prescribed formula — a real deployment swaps it for a DRF- or
/// bin-packing-aware plugin.
pub fn default_gpu_order_fn() -> GpuOrderFn {
    Arc::new(|node, candidate, _request| match candidate {
        FittingCandidate::Group(id) => {
            let total = node.memory_of_every_gpu_on_node.unwrap_or(0) as i64;
            let allocated = *node.allocated_shared_gpus_memory.get(id).unwrap_or(&0) as i64;
            total - allocated
        }
        FittingCandidate::WholeGpuIndicator => 0,
    })
}

/// A plugin predicate: node affinity, taints, volume binding, pod-affinity,
/// or a custom plugin check. Runs after node-level fit succeeds. Plugins are
/// capability sets (functions), not types (`spec.md` §9).
pub type PredicateFn = Arc<dyn Fn(&PodInfo, &NodeInfo) -> Result<(), String> + Send + Sync>;

/// Run the predicate chain; the first failure short-circuits and its
/// message becomes the node's fit-error reason.
pub fn run_predicates(pod: &PodInfo, node: &NodeInfo, predicates: &[PredicateFn]) -> Result<(), String> {
    for predicate in predicates {
        predicate(pod, node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node_with_groups() -> NodeInfo {
        let mut labels = HashMap::new();
        labels.insert(crate::node::LABEL_GPU_COUNT.to_string(), "2".to_string());
        labels.insert(crate::node::LABEL_GPU_MEMORY.to_string(), "32000".to_string());
        let mut node = NodeInfo::new("n1", labels, ResourceVector::new(64_000, 256_000, 8));
        node.record_group_usage("group-a", 16_000, false);
        node
    }

    #[test]
    fn gpu_filter_includes_fitting_groups_and_whole_gpu_sentinels() {
        let node = node_with_groups();
        let candidates = gpu_filter(&node, 8_000);
        assert!(candidates.contains(&FittingCandidate::Group("group-a".to_string())));
        let whole_count = candidates
            .iter()
            .filter(|c| matches!(c, FittingCandidate::WholeGpuIndicator))
            .count();
        assert_eq!(whole_count, node.idle_or_releasing_whole_gpus() as usize);
    }

    #[test]
    fn gpu_filter_excludes_group_without_headroom() {
        let node = node_with_groups();
        // group-a has 16000 used of 32000 total: 16000 headroom, not enough for 20000.
        let candidates = gpu_filter(&node, 20_000);
        assert!(!candidates.contains(&FittingCandidate::Group("group-a".to_string())));
    }

    #[test]
    fn ordering_is_deterministic_for_equal_scores() {
        let node = node_with_groups();
        let candidates = vec![FittingCandidate::WholeGpuIndicator, FittingCandidate::WholeGpuIndicator];
        let order_fn: GpuOrderFn = Arc::new(|_, _, _| 0);
        let req = ResReq::default();
        let ordered = order_gpu_candidates(&node, &req, candidates.clone(), &order_fn);
        let ordered_again = order_gpu_candidates(&node, &req, candidates, &order_fn);
        assert_eq!(ordered, ordered_again);
    }
}
