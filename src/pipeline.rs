// src/pipeline.rs

//! Pipeline orchestration
//!
//! Runs the stages strictly in order, each completing before the next
//! begins:
//!
//! ```text
//! Start -> Detect -> BackupAll -> AcquireLock -> Apply -> RefreshServices -> Done
//! ```
//!
//! Any fatal error takes the single abort edge to `Failed` and stops
//! the run. There is no automatic rollback of partially applied
//! mutations; recovery relies on the snapshots taken before the first
//! edit, restored by the operator. The lock wait is the only point
//! where the pipeline blocks.
//!
//! Operator choices reach the pipeline through the [`Decisions`]
//! capability, so the pipeline itself never reads standard input.

use crate::backup::{BackupManager, BackupOutcome, BackupRecord};
use crate::exec::{self, CommandRunner};
use crate::facts::HostFacts;
use crate::lock::{self, LockGuard};
use crate::mutation::Outcome;
use crate::repos::{self, HostPaths, MirrorConfig};
use crate::Result;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Detect,
    BackupAll,
    AcquireLock,
    Apply,
    RefreshServices,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::Detect => "detect",
            PipelineState::BackupAll => "backup",
            PipelineState::AcquireLock => "acquire-lock",
            PipelineState::Apply => "apply",
            PipelineState::RefreshServices => "refresh-services",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Operator decisions the pipeline needs mid-run.
pub trait Decisions {
    /// Remove packages that are no longer required?
    fn remove_unused_packages(&self) -> bool;

    /// Install the optional networking package (ifupdown2)?
    fn install_networking_package(&self) -> bool;
}

/// Non-interactive answers, fully determined up front.
pub struct FlagDecisions {
    pub remove_unused: bool,
    pub install_networking: bool,
}

impl Decisions for FlagDecisions {
    fn remove_unused_packages(&self) -> bool {
        self.remove_unused
    }

    fn install_networking_package(&self) -> bool {
        self.install_networking
    }
}

/// Asks on standard input, defaulting to "no". A preset answer (from a
/// CLI flag) short-circuits the prompt for that question only.
pub struct InteractivePrompt {
    pub assume_remove_unused: Option<bool>,
    pub assume_install_networking: Option<bool>,
}

impl Decisions for InteractivePrompt {
    fn remove_unused_packages(&self) -> bool {
        self.assume_remove_unused
            .unwrap_or_else(|| confirm("Remove packages that are no longer required?"))
    }

    fn install_networking_package(&self) -> bool {
        self.assume_install_networking
            .unwrap_or_else(|| confirm("Install ifupdown2 for reloadable network configuration?"))
    }
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct PipelineOptions {
    pub lock_timeout_secs: u64,
    /// Reconfigure repositories only; skip the dist-upgrade step.
    pub skip_upgrade: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lock_timeout_secs: lock::DEFAULT_LOCK_TIMEOUT_SECS,
            skip_upgrade: false,
        }
    }
}

/// What a completed run did, for reporting and for tests.
#[derive(Debug)]
pub struct PipelineReport {
    pub facts: HostFacts,
    pub backup_dir: PathBuf,
    pub backed_up: Vec<BackupRecord>,
    pub applied: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub struct Pipeline<'a> {
    paths: HostPaths,
    mirror: MirrorConfig,
    runner: &'a dyn CommandRunner,
    decisions: &'a dyn Decisions,
    options: PipelineOptions,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        paths: HostPaths,
        mirror: MirrorConfig,
        runner: &'a dyn CommandRunner,
        decisions: &'a dyn Decisions,
        options: PipelineOptions,
    ) -> Self {
        Self {
            paths,
            mirror,
            runner,
            decisions,
            options,
            state: PipelineState::Start,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline to completion or to the first fatal error.
    pub fn run(&mut self) -> Result<PipelineReport> {
        match self.run_stages() {
            Ok(report) => Ok(report),
            Err(err) => {
                let stage = self.state;
                self.state = PipelineState::Failed;
                error!("pipeline failed during {stage}: {err}");
                Err(err)
            }
        }
    }

    fn enter(&mut self, next: PipelineState) {
        info!("entering {next} stage");
        self.state = next;
    }

    fn run_stages(&mut self) -> Result<PipelineReport> {
        self.enter(PipelineState::Detect);
        let facts = HostFacts::gather(self.paths.root(), self.runner)?;
        info!("detected {} host", facts.codename);

        // Backups must complete for every file the plan will touch
        // before the first mutation runs.
        self.enter(PipelineState::BackupAll);
        let plan = repos::plan(&facts, &self.mirror, &self.paths);
        let manager = BackupManager::create(&self.paths.backup_root())?;
        let mut backed_up = Vec::new();
        for path in repos::backup_set(&plan, &self.paths) {
            if let BackupOutcome::Saved(record) = manager.backup(&path)? {
                backed_up.push(record);
            }
        }

        self.enter(PipelineState::AcquireLock);
        let guard = LockGuard::new(
            lock::apt_lock_paths(self.paths.root()),
            self.options.lock_timeout_secs,
        );
        guard.wait()?;

        self.enter(PipelineState::Apply);
        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for target in &plan {
            match target.apply()? {
                Outcome::Applied => applied.push(target.path().to_path_buf()),
                Outcome::Skipped => skipped.push(target.path().to_path_buf()),
            }
        }
        info!(
            "{} mutation(s) applied, {} already in desired state",
            applied.len(),
            skipped.len()
        );

        self.enter(PipelineState::RefreshServices);
        exec::apt_update(self.runner)?;
        if !self.options.skip_upgrade {
            exec::apt_dist_upgrade(self.runner)?;
        }
        if self.decisions.remove_unused_packages() {
            exec::apt_autoremove(self.runner)?;
        }
        exec::apt_clean(self.runner)?;
        if facts.has_tool("pveam") {
            exec::pveam_update(self.runner)?;
        }
        if self.decisions.install_networking_package() {
            exec::apt_install(self.runner, "ifupdown2")?;
        }
        exec::restart_services(self.runner)?;

        self.enter(PipelineState::Done);
        Ok(PipelineReport {
            facts,
            backup_dir: manager.run_dir().to_path_buf(),
            backed_up,
            applied,
            skipped,
        })
    }
}
