// src/mutation.rs

//! Idempotent, data-described file edits
//!
//! Every edit the pipeline performs is declared as a [`MutationTarget`]
//! and applied by one generic interpreter. Idempotence is a property of
//! the interpreter, not of call sites: applying any target twice leaves
//! the filesystem exactly as one application does.
//!
//! Whole-file writes go through a same-directory temp file and an
//! atomic rename, so a crash mid-write never leaves a truncated
//! descriptor behind.

use crate::Result;
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum MutationTarget {
    /// Replace (or create) the file with deterministic template output.
    OverwriteWithTemplate { path: PathBuf, contents: String },
    /// Replace every literal occurrence of `old` with `new`.
    SubstituteText {
        path: PathBuf,
        old: String,
        new: String,
    },
    /// Prefix `# ` on lines matching `pattern` that are not yet comments.
    CommentOutLines { path: PathBuf, pattern: Regex },
    /// Rename the file out of the way by appending `suffix`.
    RenameToDisabled { path: PathBuf, suffix: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
}

impl MutationTarget {
    pub fn path(&self) -> &Path {
        match self {
            MutationTarget::OverwriteWithTemplate { path, .. }
            | MutationTarget::SubstituteText { path, .. }
            | MutationTarget::CommentOutLines { path, .. }
            | MutationTarget::RenameToDisabled { path, .. } => path,
        }
    }

    /// Apply the edit. A missing file for the editing kinds is a
    /// `Skipped` outcome; only unrecoverable filesystem failures error.
    pub fn apply(&self) -> Result<Outcome> {
        match self {
            MutationTarget::OverwriteWithTemplate { path, contents } => overwrite(path, contents),
            MutationTarget::SubstituteText { path, old, new } => substitute(path, old, new),
            MutationTarget::CommentOutLines { path, pattern } => comment_out(path, pattern),
            MutationTarget::RenameToDisabled { path, suffix } => rename_disabled(path, suffix),
        }
    }
}

fn overwrite(path: &Path, contents: &str) -> Result<Outcome> {
    if let Ok(current) = fs::read_to_string(path) {
        if current == contents {
            debug!("{} already matches template", path.display());
            return Ok(Outcome::Skipped);
        }
    }
    write_atomic(path, contents)?;
    info!("wrote {}", path.display());
    Ok(Outcome::Applied)
}

fn substitute(path: &Path, old: &str, new: &str) -> Result<Outcome> {
    let current = match read_existing(path)? {
        Some(content) => content,
        None => return Ok(Outcome::Skipped),
    };
    if !current.contains(old) {
        debug!("{} contains no {old:?}, nothing to substitute", path.display());
        return Ok(Outcome::Skipped);
    }
    write_atomic(path, &current.replace(old, new))?;
    info!("substituted {old:?} -> {new:?} in {}", path.display());
    Ok(Outcome::Applied)
}

fn comment_out(path: &Path, pattern: &Regex) -> Result<Outcome> {
    let current = match read_existing(path)? {
        Some(content) => content,
        None => return Ok(Outcome::Skipped),
    };
    let mut changed = 0usize;
    let mut output = String::with_capacity(current.len());
    for line in current.lines() {
        if pattern.is_match(line) && !line.trim_start().starts_with('#') {
            output.push_str("# ");
            changed += 1;
        }
        output.push_str(line);
        output.push('\n');
    }
    if changed == 0 {
        debug!("{} has no active lines left to disable", path.display());
        return Ok(Outcome::Skipped);
    }
    write_atomic(path, &output)?;
    info!("disabled {changed} line(s) in {}", path.display());
    Ok(Outcome::Applied)
}

fn rename_disabled(path: &Path, suffix: &str) -> Result<Outcome> {
    if !path.exists() {
        debug!("{} absent or already disabled", path.display());
        return Ok(Outcome::Skipped);
    }
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    let destination = path.with_file_name(name);
    fs::rename(path, &destination)?;
    info!("renamed {} -> {}", path.display(), destination.display());
    Ok(Outcome::Applied)
}

/// Read a file that must already exist for the edit to make sense.
/// `Ok(None)` when absent; only real I/O failures propagate.
fn read_existing(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("{} not present, skipping", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `contents` through a same-directory temp file and rename it
/// over `path`, carrying over the original mode and ownership.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let existing = fs::metadata(path).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;

    if let Some(meta) = existing {
        fs::set_permissions(tmp.path(), meta.permissions())?;
        let uid = nix::unistd::Uid::from_raw(meta.uid());
        let gid = nix::unistd::Gid::from_raw(meta.gid());
        nix::unistd::chown(tmp.path(), Some(uid), Some(gid))
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
