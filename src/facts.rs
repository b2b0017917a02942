// src/facts.rs

//! Host identity detection
//!
//! Builds an immutable [`HostFacts`] snapshot once, at pipeline start.
//! Every later component branches on the snapshot by parameter; nothing
//! reads the environment again after detection. An unknown release
//! codename aborts here, before any side effect.

use crate::exec::CommandRunner;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Optional tools probed on the search path. A missing tool is a normal
/// boolean outcome that disables the matching mutations, never an error.
pub const PROBED_TOOLS: &[&str] = &["ceph", "pveam"];

/// Supported release branch keys.
///
/// `Bookworm` hosts carry legacy single-line repository descriptors,
/// `Trixie` hosts carry deb822 block descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codename {
    Bookworm,
    Trixie,
}

impl Codename {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codename::Bookworm => "bookworm",
            Codename::Trixie => "trixie",
        }
    }

    /// Map a raw `VERSION_CODENAME` value to a branch key.
    pub fn from_os_release(raw: &str) -> Result<Self> {
        match raw {
            "bookworm" => Ok(Codename::Bookworm),
            "trixie" => Ok(Codename::Trixie),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the facts the pipeline branches on.
#[derive(Debug, Clone)]
pub struct HostFacts {
    pub codename: Codename,
    tools: BTreeSet<String>,
    /// Release name of the installed storage cluster, e.g. "quincy".
    /// `None` when the ceph tool is absent or its version is unparsable.
    pub ceph_release: Option<String>,
}

impl HostFacts {
    /// Detect the host's release codename and optional tooling.
    ///
    /// Fails with [`Error::Environment`] when the identity file under
    /// `<root>/etc/os-release` is absent or unreadable, and with
    /// [`Error::UnsupportedVersion`] for any codename outside the
    /// supported set.
    pub fn gather(root: &Path, runner: &dyn CommandRunner) -> Result<Self> {
        let os_release = root.join("etc/os-release");
        let content = fs::read_to_string(&os_release).map_err(|e| {
            Error::Environment(format!("cannot read {}: {e}", os_release.display()))
        })?;
        let raw = codename_from_os_release(&content).ok_or_else(|| {
            Error::Environment(format!(
                "no VERSION_CODENAME in {}",
                os_release.display()
            ))
        })?;
        let codename = Codename::from_os_release(&raw)?;

        let mut tools = BTreeSet::new();
        for tool in PROBED_TOOLS {
            if runner.has_tool(tool) {
                tools.insert((*tool).to_string());
            } else {
                debug!("{tool} not found on PATH, related steps will be skipped");
            }
        }

        let ceph_release = if tools.contains("ceph") {
            let output = runner.output("ceph", &["--version"])?;
            let release = parse_ceph_release(&output);
            match &release {
                Some(name) => info!("storage cluster release: {name}"),
                None => debug!("could not parse ceph version output"),
            }
            release
        } else {
            None
        };

        Ok(Self {
            codename,
            tools,
            ceph_release,
        })
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains(name)
    }
}

#[cfg(test)]
impl HostFacts {
    pub(crate) fn for_tests(
        codename: Codename,
        tools: BTreeSet<String>,
        ceph_release: Option<String>,
    ) -> Self {
        Self {
            codename,
            tools,
            ceph_release,
        }
    }
}

/// Verify the process runs with root privileges.
pub fn require_root() -> Result<()> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(Error::Environment(
            "this tool mutates system configuration and must run as root".to_string(),
        ))
    }
}

fn codename_from_os_release(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("VERSION_CODENAME=") {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Extract the release name from `ceph --version` output.
///
/// The name is the token preceding the last field on the version line:
/// `ceph version 17.2.6 (995dec2cdae920da21db2d455e55efbc339bde24) quincy (stable)`
/// yields `quincy`.
pub fn parse_ceph_release(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.contains("ceph version"))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return None;
    }
    Some(fields[fields.len() - 2].to_string())
}
