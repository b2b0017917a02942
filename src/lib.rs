// src/lib.rs

//! pvemirror: backup-first, idempotent repository reconfiguration for
//! Proxmox VE hosts.
//!
//! The crate models one linear configuration-mutation pipeline:
//!
//! ```text
//! Detect -> BackupAll -> AcquireLock -> Apply -> RefreshServices -> Done
//! ```
//!
//! - **facts**: host identity (release codename, optional tooling)
//! - **backup**: timestamped, append-only pre-mutation snapshots
//! - **lock**: bounded wait for the package-database lock
//! - **mutation**: idempotent, data-described file edits
//! - **repos**: per-release mutation plans and descriptor templates
//! - **exec**: external collaborators (apt-get, pveam, systemctl, ceph)
//! - **pipeline**: orchestration and operator decisions
//!
//! Every file a mutation will touch is snapshotted first; a rerun of the
//! whole pipeline changes nothing beyond a fresh backup directory.

pub mod backup;
pub mod cli;
mod error;
pub mod exec;
pub mod facts;
pub mod lock;
pub mod mutation;
pub mod pipeline;
pub mod repos;

pub use backup::{BackupManager, BackupOutcome, BackupRecord};
pub use error::{Error, Result};
pub use facts::{Codename, HostFacts};
pub use lock::LockGuard;
pub use mutation::{MutationTarget, Outcome};
pub use pipeline::{
    Decisions, FlagDecisions, InteractivePrompt, Pipeline, PipelineOptions, PipelineReport,
    PipelineState,
};
pub use repos::{HostPaths, MirrorConfig};
