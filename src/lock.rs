// src/lock.rs

//! Bounded wait for the package-database lock
//!
//! The package manager takes exclusive locks on its database while it
//! runs; invoking it concurrently fails hard. This guard converts that
//! unpredictable external failure into a bounded, observable wait: poll
//! once per second, report progress, and give up with a fatal error
//! once the budget is spent.
//!
//! Probing is two-tier behind [`LockGuard::is_locked`]:
//! 1. flock-probe each lock path (taking and immediately releasing the
//!    lock proves nobody else holds it);
//! 2. when a path cannot be opened for probing, fall back to scanning
//!    the process table for known package-manager process names.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, info};

pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 300;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

// comm names as the kernel reports them (truncated to 15 bytes)
const MANAGER_PROCESS_NAMES: &[&str] = &["apt", "apt-get", "aptitude", "dpkg", "unattended-upgr"];

/// The lock files the package manager contends on.
pub fn apt_lock_paths(root: &Path) -> Vec<PathBuf> {
    [
        "var/lib/dpkg/lock",
        "var/lib/dpkg/lock-frontend",
        "var/lib/apt/lists/lock",
        "var/cache/apt/archives/lock",
    ]
    .iter()
    .map(|p| root.join(p))
    .collect()
}

pub struct LockGuard {
    paths: Vec<PathBuf>,
    timeout_secs: u64,
}

impl LockGuard {
    pub fn new(paths: Vec<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            paths,
            timeout_secs,
        }
    }

    /// Whether any guarded resource is currently held by another process.
    pub fn is_locked(&self) -> bool {
        let mut need_fallback = false;
        for path in &self.paths {
            match probe_flock(path) {
                Some(true) => return true,
                Some(false) => {}
                None => need_fallback = true,
            }
        }
        need_fallback && manager_process_running()
    }

    /// Block until every guarded resource is free.
    ///
    /// Returns immediately when nothing holds a lock. Fails with
    /// [`Error::LockTimeout`] once the elapsed wait reaches the
    /// configured budget; this is fatal and is not retried further.
    pub fn wait(&self) -> Result<()> {
        let mut elapsed = 0u64;
        loop {
            if !self.is_locked() {
                if elapsed > 0 {
                    info!("package database lock released after {elapsed}s");
                }
                return Ok(());
            }
            if elapsed >= self.timeout_secs {
                return Err(Error::LockTimeout {
                    seconds: self.timeout_secs,
                });
            }
            info!(
                "waiting for package database lock ({elapsed}s/{}s)",
                self.timeout_secs
            );
            thread::sleep(POLL_INTERVAL);
            elapsed += 1;
        }
    }
}

/// Probe one lock path.
///
/// `Some(held)` when the flock probe was conclusive; `None` when the
/// path exists but cannot be opened, in which case the caller falls
/// back to the coarser process scan. A path that does not exist is
/// unheld: the package manager has simply never run under this root.
fn probe_flock(path: &Path) -> Option<bool> {
    if !path.exists() {
        return Some(false);
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("cannot open {} for probing: {e}", path.display());
            return None;
        }
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = fs2::FileExt::unlock(&file);
            Some(false)
        }
        Err(_) => Some(true),
    }
}

fn manager_process_running() -> bool {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.processes().values().any(|process| {
        MANAGER_PROCESS_NAMES
            .iter()
            .any(|name| process.name() == *name)
    })
}
