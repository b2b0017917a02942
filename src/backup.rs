// src/backup.rs

//! Pre-mutation file snapshots
//!
//! Every file a later mutation touches is copied into a per-run,
//! timestamp-named subdirectory of the backup root before the first
//! edit happens. The store is append-only: runs accumulate and nothing
//! is pruned, so the operator can always restore the state that
//! preceded any given run. The source file is never modified.

use crate::Result;
use chrono::Local;
use filetime::FileTime;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// One completed snapshot.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub timestamp: String,
}

/// Outcome of a backup request. A missing source is expected on hosts
/// lacking optional components and is not an error.
#[derive(Debug)]
pub enum BackupOutcome {
    Saved(BackupRecord),
    Skipped,
}

/// Writes snapshots into one run directory, named by a sortable
/// timestamp under the backup root.
pub struct BackupManager {
    run_dir: PathBuf,
    timestamp: String,
}

impl BackupManager {
    /// Create the run directory. When two runs start within the same
    /// second, a numeric suffix keeps the directories distinct so no
    /// earlier snapshot is ever overwritten.
    pub fn create(backup_root: &Path) -> Result<Self> {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut run_dir = backup_root.join(&timestamp);
        let mut attempt = 1;
        while run_dir.exists() {
            attempt += 1;
            run_dir = backup_root.join(format!("{timestamp}-{attempt}"));
        }
        fs::create_dir_all(&run_dir)?;
        info!("backup directory: {}", run_dir.display());
        Ok(Self { run_dir, timestamp })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Snapshot one file, preserving content, mode, ownership and
    /// modification time. Returns `Skipped` when the source is absent.
    pub fn backup(&self, source: &Path) -> Result<BackupOutcome> {
        let meta = match fs::metadata(source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not present, nothing to back up", source.display());
                return Ok(BackupOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        let name = source.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot back up {}: no file name", source.display()),
            )
        })?;
        let destination = self.run_dir.join(name);

        fs::copy(source, &destination)?;
        let uid = nix::unistd::Uid::from_raw(meta.uid());
        let gid = nix::unistd::Gid::from_raw(meta.gid());
        nix::unistd::chown(destination.as_path(), Some(uid), Some(gid))
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        filetime::set_file_mtime(&destination, FileTime::from_last_modification_time(&meta))?;

        info!("backed up {} -> {}", source.display(), destination.display());
        Ok(BackupOutcome::Saved(BackupRecord {
            source: source.to_path_buf(),
            destination,
            timestamp: self.timestamp.clone(),
        }))
    }
}
