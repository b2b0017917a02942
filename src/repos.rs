// src/repos.rs

//! Repository descriptors and mutation plans
//!
//! Maps a detected host onto the concrete set of [`MutationTarget`]s
//! for its release: legacy single-line descriptors on bookworm, deb822
//! block descriptors on trixie. Plan construction is a pure function of
//! the facts: which targets exist at all is decided here, so the
//! applier never needs to know about releases or optional subsystems.

use crate::facts::{Codename, HostFacts};
use crate::mutation::MutationTarget;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIRROR_HOST: &str = "mirrors.ustc.edu.cn";
pub const DISABLED_SUFFIX: &str = ".disabled";

const DEBIAN_HOST: &str = "deb.debian.org";
const DEBIAN_SECURITY_HOST: &str = "security.debian.org";
const PROXMOX_DOWNLOAD_URL: &str = "http://download.proxmox.com";

/// The regional mirror to substitute for the vendor defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_host() -> String {
    DEFAULT_MIRROR_HOST.to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            scheme: default_scheme(),
        }
    }
}

impl MirrorConfig {
    /// Load mirror settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    fn url(&self, path: &str) -> String {
        format!("{}://{}/{path}", self.scheme, self.host)
    }
}

/// Well-known file locations, joined under a configurable root so the
/// whole pipeline can run against a chroot or a test directory.
#[derive(Debug, Clone)]
pub struct HostPaths {
    root: PathBuf,
}

impl HostPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn os_release(&self) -> PathBuf {
        self.root.join("etc/os-release")
    }

    pub fn sources_list(&self) -> PathBuf {
        self.root.join("etc/apt/sources.list")
    }

    fn sources_list_d(&self, name: &str) -> PathBuf {
        self.root.join("etc/apt/sources.list.d").join(name)
    }

    pub fn enterprise_list(&self) -> PathBuf {
        self.sources_list_d("pve-enterprise.list")
    }

    pub fn enterprise_sources(&self) -> PathBuf {
        self.sources_list_d("pve-enterprise.sources")
    }

    pub fn no_subscription_list(&self) -> PathBuf {
        self.sources_list_d("pve-no-subscription.list")
    }

    pub fn debian_sources(&self) -> PathBuf {
        self.sources_list_d("debian.sources")
    }

    pub fn proxmox_sources(&self) -> PathBuf {
        self.sources_list_d("proxmox.sources")
    }

    pub fn ceph_list(&self) -> PathBuf {
        self.sources_list_d("ceph.list")
    }

    pub fn ceph_sources(&self) -> PathBuf {
        self.sources_list_d("ceph.sources")
    }

    /// Backed up before every run, never mutated.
    pub fn interfaces(&self) -> PathBuf {
        self.root.join("etc/network/interfaces")
    }

    /// Vendor template catalog module; its download URL gets pointed at
    /// the mirror so `pveam` fetches templates from nearby too.
    pub fn apl_info(&self) -> PathBuf {
        self.root.join("usr/share/perl5/PVE/APLInfo.pm")
    }

    pub fn backup_root(&self) -> PathBuf {
        self.root.join("var/backups/pvemirror")
    }
}

/// Construct the mutation plan for a detected host.
///
/// The storage-cluster descriptor is only planned when the ceph tool is
/// installed and its release is known; on other hosts the target is
/// never constructed, so nothing downstream has to special-case it.
pub fn plan(facts: &HostFacts, mirror: &MirrorConfig, paths: &HostPaths) -> Vec<MutationTarget> {
    let mut targets = Vec::new();
    let codename = facts.codename;

    match codename {
        Codename::Bookworm => {
            targets.push(MutationTarget::SubstituteText {
                path: paths.sources_list(),
                old: DEBIAN_HOST.to_string(),
                new: mirror.host.clone(),
            });
            targets.push(MutationTarget::SubstituteText {
                path: paths.sources_list(),
                old: DEBIAN_SECURITY_HOST.to_string(),
                new: mirror.host.clone(),
            });
            targets.push(MutationTarget::CommentOutLines {
                path: paths.enterprise_list(),
                pattern: Regex::new(r"^\s*deb").expect("hard-coded pattern compiles"),
            });
            targets.push(MutationTarget::OverwriteWithTemplate {
                path: paths.no_subscription_list(),
                contents: no_subscription_list(mirror, codename),
            });
            if let Some(release) = ceph_release(facts) {
                targets.push(MutationTarget::OverwriteWithTemplate {
                    path: paths.ceph_list(),
                    contents: ceph_list(mirror, codename, release),
                });
            }
        }
        Codename::Trixie => {
            targets.push(MutationTarget::OverwriteWithTemplate {
                path: paths.debian_sources(),
                contents: debian_sources(mirror, codename),
            });
            targets.push(MutationTarget::RenameToDisabled {
                path: paths.enterprise_sources(),
                suffix: DISABLED_SUFFIX.to_string(),
            });
            targets.push(MutationTarget::OverwriteWithTemplate {
                path: paths.proxmox_sources(),
                contents: proxmox_sources(mirror, codename),
            });
            if let Some(release) = ceph_release(facts) {
                targets.push(MutationTarget::OverwriteWithTemplate {
                    path: paths.ceph_sources(),
                    contents: ceph_sources(mirror, codename, release),
                });
            }
        }
    }

    targets.push(MutationTarget::SubstituteText {
        path: paths.apl_info(),
        old: PROXMOX_DOWNLOAD_URL.to_string(),
        new: mirror.url("proxmox"),
    });

    targets
}

/// The files offered to the backup manager before any mutation runs:
/// every planned target plus the network configuration, which is backed
/// up for operator recovery but never touched.
pub fn backup_set(plan: &[MutationTarget], paths: &HostPaths) -> Vec<PathBuf> {
    let mut set = vec![paths.interfaces()];
    for target in plan {
        let path = target.path().to_path_buf();
        if !set.contains(&path) {
            set.push(path);
        }
    }
    set
}

fn ceph_release(facts: &HostFacts) -> Option<&str> {
    if facts.has_tool("ceph") {
        facts.ceph_release.as_deref()
    } else {
        None
    }
}

fn no_subscription_list(mirror: &MirrorConfig, codename: Codename) -> String {
    format!(
        "deb {} {codename} pve-no-subscription\n",
        mirror.url("proxmox/debian/pve")
    )
}

fn ceph_list(mirror: &MirrorConfig, codename: Codename, release: &str) -> String {
    format!(
        "deb {} {codename} no-subscription\n",
        mirror.url(&format!("proxmox/debian/ceph-{release}"))
    )
}

fn debian_sources(mirror: &MirrorConfig, codename: Codename) -> String {
    format!(
        "Types: deb\n\
         URIs: {debian}\n\
         Suites: {codename} {codename}-updates\n\
         Components: main contrib non-free non-free-firmware\n\
         Signed-By: /usr/share/keyrings/debian-archive-keyring.gpg\n\
         \n\
         Types: deb\n\
         URIs: {security}\n\
         Suites: {codename}-security\n\
         Components: main contrib non-free non-free-firmware\n\
         Signed-By: /usr/share/keyrings/debian-archive-keyring.gpg\n",
        debian = mirror.url("debian"),
        security = mirror.url("debian-security"),
    )
}

fn proxmox_sources(mirror: &MirrorConfig, codename: Codename) -> String {
    format!(
        "Types: deb\n\
         URIs: {}\n\
         Suites: {codename}\n\
         Components: pve-no-subscription\n\
         Signed-By: /usr/share/keyrings/proxmox-archive-keyring.gpg\n",
        mirror.url("proxmox/debian/pve"),
    )
}

fn ceph_sources(mirror: &MirrorConfig, codename: Codename, release: &str) -> String {
    format!(
        "Types: deb\n\
         URIs: {}\n\
         Suites: {codename}\n\
         Components: no-subscription\n\
         Signed-By: /usr/share/keyrings/proxmox-archive-keyring.gpg\n",
        mirror.url(&format!("proxmox/debian/ceph-{release}")),
    )
}
