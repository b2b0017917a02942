// tests/common/mod.rs

//! Shared fixtures and helpers for integration tests.

use pvemirror::exec::CommandRunner;
use pvemirror::repos::HostPaths;
use pvemirror::Result;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

pub const UPSTREAM_SOURCES_LIST: &str = "\
deb http://deb.debian.org/debian bookworm main contrib
deb http://deb.debian.org/debian bookworm-updates main contrib
deb http://security.debian.org/debian-security bookworm-security main contrib
";

pub const ENTERPRISE_LIST: &str =
    "deb https://enterprise.proxmox.com/debian/pve bookworm pve-enterprise\n";

pub const ENTERPRISE_SOURCES: &str = "\
Types: deb
URIs: https://enterprise.proxmox.com/debian/pve
Suites: trixie
Components: pve-enterprise
Signed-By: /usr/share/keyrings/proxmox-archive-keyring.gpg
";

pub const INTERFACES: &str = "auto lo\niface lo inet loopback\n";

/// Build a fake host root for the given release codename.
///
/// Keep the TempDir alive to prevent cleanup.
pub fn setup_host_root(codename: &str) -> (TempDir, HostPaths) {
    let temp = tempfile::tempdir().unwrap();
    let paths = HostPaths::new(temp.path());

    fs::create_dir_all(temp.path().join("etc/apt/sources.list.d")).unwrap();
    fs::create_dir_all(temp.path().join("etc/network")).unwrap();
    fs::write(
        paths.os_release(),
        format!(
            "PRETTY_NAME=\"Debian GNU/Linux\"\nID=debian\nVERSION_CODENAME={codename}\n"
        ),
    )
    .unwrap();
    fs::write(paths.sources_list(), UPSTREAM_SOURCES_LIST).unwrap();
    fs::write(paths.interfaces(), INTERFACES).unwrap();

    match codename {
        "bookworm" => fs::write(paths.enterprise_list(), ENTERPRISE_LIST).unwrap(),
        "trixie" => fs::write(paths.enterprise_sources(), ENTERPRISE_SOURCES).unwrap(),
        _ => {}
    }

    (temp, paths)
}

/// Records every invocation instead of spawning processes.
#[derive(Default)]
pub struct RecordingRunner {
    pub commands: RefCell<Vec<String>>,
    pub tools: BTreeSet<String>,
    pub ceph_version_output: Option<String>,
}

impl RecordingRunner {
    pub fn with_ceph(output: &str) -> Self {
        let mut tools = BTreeSet::new();
        tools.insert("ceph".to_string());
        Self {
            commands: RefCell::new(Vec::new()),
            tools,
            ceph_version_output: Some(output.to_string()),
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        self.commands
            .borrow_mut()
            .push(format!("{program} {}", args.join(" ")));
        Ok(())
    }

    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        self.commands
            .borrow_mut()
            .push(format!("{program} {}", args.join(" ")));
        Ok(self.ceph_version_output.clone().unwrap_or_default())
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains(name)
    }
}
