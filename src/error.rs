// src/error.rs

//! Crate-level error taxonomy
//!
//! Fatal conditions abort the whole pipeline; "file is absent" and
//! "already in the desired state" are not errors and are modeled as
//! `Skipped` outcomes by the components themselves.

use thiserror::Error;

/// Result type for pvemirror operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Host identity source missing/unreadable, or insufficient privilege
    #[error("environment error: {0}")]
    Environment(String),

    /// Release codename outside the supported set
    #[error("unsupported release codename: {0}")]
    UnsupportedVersion(String),

    /// The package database stayed locked for the whole wait budget
    #[error("package database still locked after {seconds}s")]
    LockTimeout { seconds: u64 },

    /// Unrecoverable filesystem failure during backup or mutation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external collaborator exited with a non-zero status
    #[error("{program} exited with status {code}")]
    CommandFailed { program: String, code: i32 },

    /// An external collaborator exceeded its execution bound
    #[error("{program} did not finish within {seconds}s")]
    CommandTimeout { program: String, seconds: u64 },

    /// Malformed mirror configuration file
    #[error("config error: {0}")]
    Config(String),
}
