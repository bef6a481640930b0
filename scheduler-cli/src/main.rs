//! CLI harness for the gang-capable GPU scheduling session core
//! (`SPEC_FULL.md` §6). Loads a cluster-state fixture, runs a fixed number
//! of allocate/reclaim cycles, and prints a JSON summary — a stand-in for
//! the orchestrator client collaborator that sits outside this workspace.

mod config;
mod fixture;

use clap::Parser;
use scheduler_core::session::{Session, SessionPolicy};
use scheduler_core::{Action, AllocateAction, ReclaimAction};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Gang-capable GPU scheduling session, driven from a cluster-state fixture.
#[derive(Parser, Debug)]
#[command(name = "scheduler-cli")]
#[command(about = "Exercises the gang-capable GPU scheduling session core")]
struct CliArgs {
    /// Optional TOML config file (`SCHED_`-prefixed env vars override it).
    #[arg(long)]
    config: Option<PathBuf>,

    /// YAML cluster-state fixture to load as the initial snapshot.
    #[arg(long)]
    snapshot: PathBuf,

    /// Number of allocate/reclaim cycles to run.
    #[arg(long, default_value_t = 1)]
    cycles: u32,

    /// Structured log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Json,
    Pretty,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

fn init_tracing(format: LogFormat, log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let session_config = config::load_config(args.config.as_deref())?;
    init_tracing(args.log_format, &session_config.log_level);

    tracing::info!(
        scheduler_name = %session_config.scheduler_name,
        gpu_sharing_enabled = session_config.gpu_sharing_enabled,
        csi_scheduling_enabled = session_config.csi_scheduling_enabled,
        "starting scheduling session"
    );

    let snapshot = fixture::load(&args.snapshot)?;

    let policy = SessionPolicy {
        default_staleness_grace_seconds: session_config.default_staleness_grace_seconds,
        node_pool_label: session_config.node_pool_label.clone(),
        ..SessionPolicy::default()
    };

    let mut session = Session::open(snapshot, policy);
    let mut summary = scheduler_core::ActionResult::default();

    for cycle in 0..args.cycles {
        let now = now_unix_seconds();
        let allocate_result = AllocateAction.execute(&mut session);
        let reclaim_result = ReclaimAction { now_unix_seconds: now }.execute(&mut session);
        let consolidate_result = scheduler_core::ConsolidateAction {
            max_consolidation_preemptees: session_config.max_consolidation_preemptees,
        }
        .execute(&mut session);

        for event in session.drain_events() {
            tracing::info!(cycle, ?event, "session event");
        }

        tracing::info!(
            cycle,
            bound = allocate_result.bound_tasks,
            pipelined = allocate_result.pipelined_tasks,
            admitted_gangs = allocate_result.admitted_gangs.len(),
            rejected_gangs = allocate_result.rejected_gangs.len(),
            evicted = reclaim_result.evicted_tasks,
            "cycle complete"
        );

        summary.merge(allocate_result);
        summary.merge(reclaim_result);
        summary.merge(consolidate_result);

        if session.budget_expired() {
            tracing::warn!(cycle, "session wall-clock budget expired, ending run early");
            break;
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
