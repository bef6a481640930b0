//! YAML cluster-state fixture loader — the stand-in for the orchestrator
//! watcher collaborator `SPEC_FULL.md` §1 places outside this workspace.

use scheduler_core::podgroup::PodGroupInfo;
use scheduler_core::queue::QueueInfo;
use scheduler_core::{PodInfo, Result, Snapshot};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SnapshotFixture {
    #[serde(default)]
    pub nodes: Vec<scheduler_core::snapshot::NodeObservation>,
    #[serde(default)]
    pub pods: Vec<PodInfo>,
    #[serde(default)]
    pub pod_groups: Vec<PodGroupInfo>,
    #[serde(default)]
    pub queues: Vec<QueueInfo>,
}

impl SnapshotFixture {
    pub fn into_snapshot(self) -> Result<Snapshot> {
        Snapshot::build(self.nodes, self.pods, self.pod_groups, self.queues)
    }
}

pub fn load(path: &std::path::Path) -> Result<Snapshot> {
    let contents = std::fs::read_to_string(path)?;
    let fixture: SnapshotFixture = serde_yaml::from_str(&contents)?;
    fixture.into_snapshot()
}
