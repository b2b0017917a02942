// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use pvemirror::cli::Cli;
use pvemirror::exec::SystemRunner;
use pvemirror::facts;
use pvemirror::pipeline::{
    Decisions, FlagDecisions, InteractivePrompt, Pipeline, PipelineOptions,
};
use pvemirror::repos::{HostPaths, MirrorConfig};
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Mutating the live system needs root; an alternate root (chroot,
    // test directory) does not.
    if cli.root == Path::new("/") {
        facts::require_root().context("refusing to run")?;
    }

    let mut mirror = match &cli.config {
        Some(path) => MirrorConfig::load(path)?,
        None => MirrorConfig::default(),
    };
    if let Some(host) = cli.mirror.clone() {
        mirror.host = host;
    }
    info!("using mirror {}://{}", mirror.scheme, mirror.host);

    let decisions: Box<dyn Decisions> = if cli.assume_yes {
        Box::new(FlagDecisions {
            remove_unused: true,
            install_networking: true,
        })
    } else {
        Box::new(InteractivePrompt {
            assume_remove_unused: cli.yes_autoremove.then_some(true),
            assume_install_networking: cli.yes_ifupdown2.then_some(true),
        })
    };

    let runner = SystemRunner::new();
    let paths = HostPaths::new(&cli.root);
    let options = PipelineOptions {
        lock_timeout_secs: cli.lock_timeout,
        skip_upgrade: cli.skip_upgrade,
    };

    let mut pipeline = Pipeline::new(paths, mirror, &runner, decisions.as_ref(), options);
    let report = pipeline.run()?;

    info!("backups stored under {}", report.backup_dir.display());
    info!(
        "done: {} file(s) changed, {} already in desired state",
        report.applied.len(),
        report.skipped.len()
    );
    Ok(())
}
