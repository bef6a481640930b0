//! End-to-end scenario coverage for `spec.md` §8.

use scheduler_core::actions::{Action, AllocateAction};
use scheduler_core::node::{NodeInfo, ResourceVector, LABEL_GPU_COUNT, LABEL_GPU_MEMORY};
use scheduler_core::pod::{PodInfo, PodStatus, ResReq};
use scheduler_core::podgroup::{GangPhase, PodGroupInfo};
use scheduler_core::queue::QueueInfo;
use scheduler_core::session::{Session, SessionPolicy};
use scheduler_core::snapshot::Snapshot;
use std::collections::HashMap;

fn node(name: &str, allocatable_gpus: u32, physical: Option<u32>, per_gpu_mb: u64) -> NodeInfo {
    let mut labels = HashMap::new();
    if let Some(p) = physical {
        labels.insert(LABEL_GPU_COUNT.to_string(), p.to_string());
    }
    labels.insert(LABEL_GPU_MEMORY.to_string(), per_gpu_mb.to_string());
    NodeInfo::new(name, labels, ResourceVector::new(64_000, 512_000, allocatable_gpus))
}

fn fractional_pod(ns: &str, name: &str, pg: &str, gpu_memory_mb: u64) -> PodInfo {
    PodInfo::new(ns, name, pg, ResReq {
        cpu_millis: 500,
        memory_mb: 1000,
        gpu_memory_mb,
        num_gpu_devices: 1,
        ..Default::default()
    })
}

/// Scenario A — time-slicing oversubscription prevention: five pods request
/// 8000 MiB each against a node that advertises 100 logical GPUs backed by
/// one physical 32600 MiB GPU. The first four must land on the same group;
/// the fifth must fail.
#[test]
fn scenario_a_time_slicing_oversubscription_prevention() {
    let mut snapshot = Snapshot::new();
    snapshot.nodes.insert("n1".to_string(), node("n1", 100, Some(1), 32_600));
    snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

    for i in 0..5 {
        let pod = fractional_pod("default", &format!("p{i}"), &format!("pg-{i}"), 8000);
        let mut pg = PodGroupInfo::new(format!("pg-{i}"), "q1", 1);
        pg.phase = GangPhase::Pending;
        pg.task_keys.push(pod.key());
        snapshot.pod_groups.insert(pg.id.clone(), pg);
        snapshot.pods.insert(pod.key(), pod);
    }

    let mut session = Session::open(snapshot, SessionPolicy::default());
    let result = AllocateAction.execute(&mut session);

    assert_eq!(result.admitted_gangs.len(), 4, "pods 1..4 should bind");
    assert_eq!(result.rejected_gangs.len(), 1, "pod 5 should remain unschedulable");

    let node = session.snapshot.node("n1").unwrap();
    assert_eq!(node.total_allocated_shared_gpu_mb(), 32_000);
    assert_eq!(node.used_shared_gpus_memory.len(), 1, "all four tenants share one group");
}

/// Scenario B — gang-atomic scheduling: {4000, 8000, 8000} with 20000 MiB
/// free must all bind, in the same statement, to the same node and group.
#[test]
fn scenario_b_gang_atomic_scheduling_succeeds() {
    let mut snapshot = Snapshot::new();
    snapshot.nodes.insert("n1".to_string(), node("n1", 1, Some(1), 20_000));
    snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

    let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
    pg.phase = GangPhase::Pending;
    for (i, mb) in [4000u64, 8000, 8000].into_iter().enumerate() {
        let pod = fractional_pod("default", &format!("p{i}"), "pg-1", mb);
        pg.task_keys.push(pod.key());
        snapshot.pods.insert(pod.key(), pod);
    }
    snapshot.pod_groups.insert("pg-1".to_string(), pg);

    let mut session = Session::open(snapshot, SessionPolicy::default());
    let result = AllocateAction.execute(&mut session);

    assert_eq!(result.admitted_gangs, vec!["pg-1".to_string()]);
    assert_eq!(result.bound_tasks, 3);

    let groups: Vec<&String> = session.snapshot.pods.values().flat_map(|p| p.gpu_groups.iter()).collect();
    let unique: std::collections::HashSet<&&String> = groups.iter().collect();
    assert_eq!(unique.len(), 1, "all three tasks share one group");
    for pod in session.snapshot.pods.values() {
        assert_eq!(pod.status, PodStatus::Binding);
    }
}

/// Scenario C — gang insufficient resources: same gang, only 15000 MiB
/// free. The statement must be discarded and nothing bound.
#[test]
fn scenario_c_gang_insufficient_resources_discards_statement() {
    let mut snapshot = Snapshot::new();
    snapshot.nodes.insert("n1".to_string(), node("n1", 1, Some(1), 15_000));
    snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

    let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
    pg.phase = GangPhase::Pending;
    for (i, mb) in [4000u64, 8000, 8000].into_iter().enumerate() {
        let pod = fractional_pod("default", &format!("p{i}"), "pg-1", mb);
        pg.task_keys.push(pod.key());
        snapshot.pods.insert(pod.key(), pod);
    }
    snapshot.pod_groups.insert("pg-1".to_string(), pg);

    let mut session = Session::open(snapshot, SessionPolicy::default());
    let result = AllocateAction.execute(&mut session);

    assert!(result.admitted_gangs.is_empty());
    assert_eq!(result.rejected_gangs, vec!["pg-1".to_string()]);
    assert_eq!(result.bound_tasks, 0);

    for pod in session.snapshot.pods.values() {
        assert_eq!(pod.status, PodStatus::Pending);
    }
    assert_eq!(
        session.snapshot.pod_group("pg-1").unwrap().phase,
        GangPhase::Unschedulable
    );
}

/// Scenario D — stale-gang eviction: a gang with `minMember=3` drops to two
/// active pods (the third was externally deleted, leaving a stale
/// `task_keys` entry on the pod-group CRD); past the grace period the
/// remaining pods must be evicted with reason `StaleJob`. Built through
/// `Snapshot::build` rather than hand-constructed, so the test also pins
/// down that `task_keys` is replaced to the two observed pods, not left at
/// the three the CRD last recorded.
#[test]
fn scenario_d_stale_gang_eviction() {
    use scheduler_core::actions::ReclaimAction;
    use scheduler_core::snapshot::NodeObservation;

    let node_obs = NodeObservation {
        name: "n1".to_string(),
        labels: HashMap::new(),
        allocatable: scheduler_core::node::ResourceVector::new(64_000, 256_000, 1),
    };

    let mut pg = PodGroupInfo::new("pg-1", "q1", 3);
    pg.phase = GangPhase::Running;
    // Stale CRD state: the group still lists a third task that no longer exists.
    pg.task_keys = vec![
        "default/p0".to_string(),
        "default/p1".to_string(),
        "default/p2".to_string(),
    ];

    let mut pods = Vec::new();
    let mut pod_keys = Vec::new();
    for i in 0..2 {
        let mut pod = PodInfo::new("default", format!("p{i}"), "pg-1", ResReq {
            cpu_millis: 1000,
            ..Default::default()
        });
        pod.status = PodStatus::Running;
        pod.node_name = Some("n1".to_string());
        pod_keys.push(pod.key());
        pods.push(pod);
    }

    let snapshot = Snapshot::build(vec![node_obs], pods, vec![pg], vec![]).unwrap();
    assert_eq!(
        snapshot.pod_group("pg-1").unwrap().task_keys,
        vec!["default/p0".to_string(), "default/p1".to_string()],
        "externally-deleted p2 must not linger in task_keys"
    );

    let mut session = Session::open(snapshot, SessionPolicy::default());

    // Simulate having already been below min_member since t=0, so a single
    // `ReclaimAction` cycle at t=121 (past the 120s default grace) performs
    // the stale transition and the eviction sweep together.
    session.snapshot.pod_group_mut("pg-1").unwrap().below_min_member_since = Some(0);

    let result = ReclaimAction { now_unix_seconds: 121 }.execute(&mut session);
    assert_eq!(result.evicted_tasks, 2);
    for key in &pod_keys {
        assert_eq!(session.snapshot.pods[key.as_str()].status, PodStatus::Releasing);
    }
}

/// Scenario E — pipeline on releasing: only one group on the only node has
/// exactly the requested MiB releasing (not yet free). Expect the task to
/// pipeline rather than bind.
#[test]
fn scenario_e_pipeline_on_releasing_capacity() {
    let mut snapshot = Snapshot::new();
    let mut n = node("n1", 1, Some(1), 16_000);
    // Existing tenant occupies the whole GPU; half of it is releasing, so
    // the group is a fit target (not fully vacated) but has no idle headroom.
    n.record_group_usage("g0", 8_000, false);
    n.record_group_usage("g0", 8_000, true);
    snapshot.nodes.insert("n1".to_string(), n);
    snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

    let mut pg = PodGroupInfo::new("pg-1", "q1", 1);
    pg.phase = GangPhase::Pending;
    let pod = fractional_pod("default", "p0", "pg-1", 8000);
    pg.task_keys.push(pod.key());
    snapshot.pod_groups.insert("pg-1".to_string(), pg);
    snapshot.pods.insert(pod.key(), pod);

    let mut session = Session::open(snapshot, SessionPolicy::default());
    let result = AllocateAction.execute(&mut session);

    // Admitted as a gang (min_member 1 reached via pipeline), but the task
    // itself must not be bound this cycle.
    assert_eq!(result.admitted_gangs, vec!["pg-1".to_string()]);
    assert_eq!(result.bound_tasks, 0);
    assert_eq!(result.pipelined_tasks, 1);
    assert_eq!(session.snapshot.pods["default/p0"].status, PodStatus::Pending);
}

/// Scenario F — whole-GPU vs fractional coexistence: a node with two
/// physical GPUs, one shared (16000/32000 used), one fully idle. A request
/// for 20000 MiB must prefer minting a new group on the idle GPU.
#[test]
fn scenario_f_prefers_idle_whole_gpu_over_insufficient_shared_group() {
    let mut snapshot = Snapshot::new();
    let mut n = node("n1", 2, Some(2), 32_000);
    n.record_group_usage("shared-0", 16_000, false);
    // The shared group already consumed one of the two physical GPUs'
    // whole-GPU slot when it was first minted; only the second is idle.
    n.idle.gpus = 1;
    snapshot.nodes.insert("n1".to_string(), n);
    snapshot.queues.insert("q1".to_string(), QueueInfo::new_leaf("q1", ResourceVector::new(1_000_000, 1_000_000, 100)));

    let mut pg = PodGroupInfo::new("pg-1", "q1", 1);
    pg.phase = GangPhase::Pending;
    let pod = fractional_pod("default", "p0", "pg-1", 20_000);
    pg.task_keys.push(pod.key());
    snapshot.pod_groups.insert("pg-1".to_string(), pg);
    snapshot.pods.insert(pod.key(), pod);

    let mut session = Session::open(snapshot, SessionPolicy::default());
    let result = AllocateAction.execute(&mut session);

    assert_eq!(result.admitted_gangs, vec!["pg-1".to_string()]);
    assert_eq!(result.bound_tasks, 1);

    let pod = &session.snapshot.pods["default/p0"];
    assert_eq!(pod.gpu_groups.len(), 1);
    let group_id = pod.gpu_groups.iter().next().unwrap();
    assert_ne!(group_id, "shared-0", "must not have joined the under-provisioned shared group");

    let node = session.snapshot.node("n1").unwrap();
    assert_eq!(node.idle.gpus, 0, "the previously-idle whole GPU was consumed");
}
