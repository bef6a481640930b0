//! Snapshot builder: produces an immutable cluster view for one scheduling
//! cycle (`spec.md` §4.1).

use crate::error::{Result, SchedulerError};
use crate::node::{NodeInfo, ResourceVector};
use crate::pod::{PodInfo, PodStatus};
use crate::podgroup::PodGroupInfo;
use crate::queue::QueueInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw observation of one node's bound/running pods, fed to the snapshot
/// builder by whatever collaborator watches the orchestrator (out of scope
/// here; see `scheduler-cli`'s fixture loader for the stand-in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeObservation {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub allocatable: ResourceVector,
}

/// Immutable per-cycle cluster view (`spec.md` §3, §4.1). Owns every
/// `*Info` struct for the duration of the session; only a `Statement`
/// mutates them, in place, with recorded inverse deltas.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub pod_groups: HashMap<String, PodGroupInfo>,
    pub nodes: HashMap<String, NodeInfo>,
    pub queues: HashMap<String, QueueInfo>,
    pub pods: HashMap<String, PodInfo>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw node observations and the full pod set,
    /// applying the four node-construction rules from `spec.md` §4.1:
    ///
    /// 1. `Idle ← Allocatable`.
    /// 2. Subtract already-bound pods' requests from `Idle` into `Used`.
    /// 3. Apply the time-slicing clamp (done inside `NodeInfo::new`).
    /// 4. Initialize per-group VRAM maps from running shared-GPU pods.
    pub fn build(
        node_observations: Vec<NodeObservation>,
        pods: Vec<PodInfo>,
        pod_groups: Vec<PodGroupInfo>,
        queues: Vec<QueueInfo>,
    ) -> Result<Snapshot> {
        let mut nodes: HashMap<String, NodeInfo> = node_observations
            .into_iter()
            .map(|obs| (obs.name.clone(), NodeInfo::new(obs.name, obs.labels, obs.allocatable)))
            .collect();

        let mut pods_by_key: HashMap<String, PodInfo> = HashMap::new();

        for pod in pods {
            let Some(node_name) = pod.node_name.clone() else {
                pods_by_key.insert(pod.key(), pod);
                continue;
            };
            let node = nodes.get_mut(&node_name).ok_or_else(|| {
                SchedulerError::Snapshot(format!(
                    "pod {} is bound to unknown node {node_name}",
                    pod.key()
                ))
            })?;

            match pod.status {
                PodStatus::Binding | PodStatus::Running => {
                    if pod.resource_request.is_fractional_gpu() {
                        for group in &pod.gpu_groups {
                            node.record_group_usage(group, pod.resource_request.gpu_memory_mb, false);
                        }
                    } else {
                        node.account_bound(&pod.resource_request.as_resource_vector());
                    }
                }
                PodStatus::Releasing => {
                    if pod.resource_request.is_fractional_gpu() {
                        for group in &pod.gpu_groups {
                            node.record_group_usage(group, pod.resource_request.gpu_memory_mb, true);
                        }
                    } else {
                        node.account_releasing(&pod.resource_request.as_resource_vector());
                    }
                }
                PodStatus::Pending | PodStatus::Succeeded | PodStatus::Failed => {}
            }

            pods_by_key.insert(pod.key(), pod);
        }

        let mut pod_groups_by_id: HashMap<String, PodGroupInfo> =
            pod_groups.into_iter().map(|pg| (pg.id.clone(), pg)).collect();

        // Pod-group task_keys must reflect exactly the pods currently
        // observed for it, independent of whatever the pod-group CRD last
        // recorded (`spec.md` §4.1 guarantee) — replaced wholesale, not
        // appended to, so a pod deleted outside this cycle disappears from
        // the count instead of lingering forever.
        let mut observed_task_keys: HashMap<String, Vec<String>> = HashMap::new();
        for pod in pods_by_key.values() {
            observed_task_keys
                .entry(pod.pod_group_id.clone())
                .or_default()
                .push(pod.key());
        }
        for keys in observed_task_keys.values_mut() {
            keys.sort();
        }
        for (pg_id, pg) in pod_groups_by_id.iter_mut() {
            pg.task_keys = observed_task_keys.remove(pg_id).unwrap_or_default();
        }

        let queues = queues.into_iter().map(|q| (q.id.clone(), q)).collect();

        Ok(Snapshot {
            pod_groups: pod_groups_by_id,
            nodes,
            queues,
            pods: pods_by_key,
        })
    }

    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(name)
    }

    pub fn pod_group(&self, id: &str) -> Option<&PodGroupInfo> {
        self.pod_groups.get(id)
    }

    pub fn pod_group_mut(&mut self, id: &str) -> Option<&mut PodGroupInfo> {
        self.pod_groups.get_mut(id)
    }

    pub fn active_task_count(&self, pod_group_id: &str) -> usize {
        self.pods
            .values()
            .filter(|p| p.pod_group_id == pod_group_id && p.is_active())
            .count()
    }
}
