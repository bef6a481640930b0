//! Batch-aware, gang-capable GPU scheduling session core.
//!
//! This crate implements the scheduling *session* — the transactional,
//! in-memory decision layer that turns one cluster snapshot into a set of
//! binding/eviction decisions for pods and pod-groups (gangs). It does not
//! talk to an orchestrator API, discover GPU devices, or run workloads; those
//! are collaborators that sit outside this crate (see `SPEC_FULL.md` §1).

pub mod actions;
pub mod error;
pub mod fitting;
pub mod gang;
pub mod node;
pub mod pod;
pub mod podgroup;
pub mod queue;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod statement;

pub use actions::{Action, ActionResult, AllocateAction, ConsolidateAction, PreemptAction, ReclaimAction};
pub use error::{FitError, FitErrors, Result, SchedulerError};
pub use node::{NodeInfo, ResourceVector};
pub use pod::{PodInfo, PodStatus, ResReq};
pub use podgroup::{GangPhase, PodGroupInfo};
pub use queue::{QueueFairnessHooks, QueueInfo};
pub use session::Session;
pub use snapshot::Snapshot;
pub use statement::Statement;
