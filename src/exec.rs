// src/exec.rs

//! External collaborators
//!
//! Everything that talks to the outside world goes through the
//! [`CommandRunner`] seam: the real [`SystemRunner`] spawns processes
//! with nullified stdin, relays their output through tracing and
//! enforces an execution bound; tests substitute a recording runner.
//! Package and service semantics stay with the external tools; this
//! module only invokes them.

use crate::{Error, Result};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// The services restarted after a successful reconfiguration.
pub const SERVICES: &[&str] = &["pvedaemon", "pveproxy"];

/// Bound on any single external command. dist-upgrade on a stale host
/// can legitimately run for a long time, hence the generous budget.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

pub trait CommandRunner {
    /// Run a command to completion, relaying its output.
    fn run(&self, program: &str, args: &[&str]) -> Result<()>;

    /// Run a command and capture its standard output.
    fn output(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Probe for an executable on the search path. Never fails.
    fn has_tool(&self, name: &str) -> bool;
}

/// Spawns real processes.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        info!("running {program} {}", args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    info!("[{program}] {line}");
                }
                for line in String::from_utf8_lossy(&output.stderr).lines() {
                    warn!("[{program}] {line}");
                }
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::CommandFailed {
                        program: program.to_string(),
                        code: status.code().unwrap_or(-1),
                    })
                }
            }
            None => {
                let _ = child.kill();
                Err(Error::CommandTimeout {
                    program: program.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("querying {program} {}", args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;
                if !status.success() {
                    return Err(Error::CommandFailed {
                        program: program.to_string(),
                        code: status.code().unwrap_or(-1),
                    });
                }
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            None => {
                let _ = child.kill();
                Err(Error::CommandTimeout {
                    program: program.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    fn has_tool(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

pub fn apt_update(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("apt-get", &["update"])
}

pub fn apt_dist_upgrade(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("apt-get", &["-y", "dist-upgrade"])
}

pub fn apt_autoremove(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("apt-get", &["-y", "autoremove"])
}

pub fn apt_clean(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("apt-get", &["clean"])
}

pub fn apt_install(runner: &dyn CommandRunner, package: &str) -> Result<()> {
    runner.run("apt-get", &["-y", "install", package])
}

/// Refresh the container-template catalog.
pub fn pveam_update(runner: &dyn CommandRunner) -> Result<()> {
    runner.run("pveam", &["update"])
}

/// Restart the two services that cache repository state. Immediate and
/// synchronous, so a restart failure stays visible in the exit code.
pub fn restart_services(runner: &dyn CommandRunner) -> Result<()> {
    let mut args = vec!["restart"];
    args.extend_from_slice(SERVICES);
    runner.run("systemctl", &args)
}
