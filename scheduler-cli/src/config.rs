//! Session configuration: file + environment layering, modeled on
//! `gflow::config::load_config` (`AndPuQing/gflow/src/config.rs`) and the
//! teacher's `NodeAgentConfig`/`SchedulerConfig` defaulting pattern
//! (`zenith-scheduler/src/agent.rs`).

use serde::Deserialize;
use std::path::Path;

/// Session-wide knobs a deployment tunes without touching code
/// (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_scheduler_name")]
    pub scheduler_name: String,
    #[serde(default)]
    pub node_pool_label: Option<String>,
    #[serde(default)]
    pub gpu_sharing_enabled: bool,
    #[serde(default = "default_staleness_grace_seconds")]
    pub default_staleness_grace_seconds: u64,
    #[serde(default)]
    pub max_consolidation_preemptees: usize,
    #[serde(default)]
    pub csi_scheduling_enabled: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheduler_name: default_scheduler_name(),
            node_pool_label: None,
            gpu_sharing_enabled: true,
            default_staleness_grace_seconds: default_staleness_grace_seconds(),
            max_consolidation_preemptees: 0,
            csi_scheduling_enabled: false,
            log_level: default_log_level(),
        }
    }
}

fn default_scheduler_name() -> String {
    "gang-gpu-scheduler".to_string()
}

fn default_staleness_grace_seconds() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load config from an optional TOML file, then `SCHED_`-prefixed
/// environment overrides, falling back to field defaults — the same
/// file-then-env-then-defaults layering `gflow::config::load_config` uses.
pub fn load_config(config_path: Option<&Path>) -> scheduler_core::Result<SessionConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    let built = builder
        .add_source(
            config::Environment::with_prefix("SCHED")
                .separator("_")
                .try_parsing(true),
        )
        .build()?;
    Ok(built.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_a_config_file() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.scheduler_name, "gang-gpu-scheduler");
        assert_eq!(cfg.default_staleness_grace_seconds, 120);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults_with_a_warning() {
        let cfg = load_config(Some(Path::new("/nonexistent/path/to/scheduler.toml"))).unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }
}
