// src/cli.rs

//! CLI definitions
//!
//! The command surface is a single invocation with flags; the actual
//! pipeline lives in the `pipeline` module. Unset acceptance flags fall
//! back to interactive prompts that default to "no".

use crate::lock;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pvemirror")]
#[command(version)]
#[command(
    about = "Switch a Proxmox VE host to a regional package mirror",
    long_about = None
)]
pub struct Cli {
    /// Mirror host to substitute for the vendor defaults
    #[arg(short, long)]
    pub mirror: Option<String>,

    /// Path to a TOML mirror configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Filesystem root to operate on
    #[arg(long, default_value = "/")]
    pub root: PathBuf,

    /// Remove unused packages without asking
    #[arg(long)]
    pub yes_autoremove: bool,

    /// Install ifupdown2 without asking
    #[arg(long)]
    pub yes_ifupdown2: bool,

    /// Answer yes to every prompt
    #[arg(short = 'y', long)]
    pub assume_yes: bool,

    /// Seconds to wait for the package database lock
    #[arg(long, default_value_t = lock::DEFAULT_LOCK_TIMEOUT_SECS)]
    pub lock_timeout: u64,

    /// Reconfigure repositories only, skip the dist-upgrade step
    #[arg(long)]
    pub skip_upgrade: bool,
}
