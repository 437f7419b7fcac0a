//! # Error Handling
//!
//! This module defines the centralized error type for `gpack`. It uses the
//! `thiserror` library to build an `Error` enum covering every failure mode
//! the synchronization engine can hit, with enough context (mirror name,
//! path, git command) to explain the failure in a single line.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants map onto the failure taxonomy of
//!   the engine: command failures, missing mirrors, ledger I/O failures,
//!   irreconcilable mirrors, configuration problems and plain I/O.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Permission problems met while walking a mirror are *not* errors: the
//! permission enforcer records them as skips and keeps going. They only
//! appear here as [`Error::PermissionDenied`] so that a skip can be rendered
//! with the same wording as every other failure.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for gpack operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing the `GpackRepos` configuration file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Two configured repositories resolve to the same directory on disk.
    #[error("Repositories '{first}' and '{second}' both resolve to {}", path.display())]
    DuplicatePath {
        first: String,
        second: String,
        path: PathBuf,
    },

    /// Two configured repositories share the directory name used to address
    /// them on the command line.
    #[error("Repositories '{first}' and '{second}' are both named '{name}'")]
    DuplicateName {
        first: String,
        second: String,
        name: String,
    },

    /// A repository name given on the command line is not configured.
    #[error("Unknown repository '{name}' (known: {known})")]
    UnknownRepository { name: String, known: String },

    /// A git command exited with a non-zero status.
    #[error("Git command failed in {}: git {command}\n{output}", path.display())]
    GitCommand {
        command: String,
        path: PathBuf,
        output: String,
    },

    /// The git binary could not be started at all.
    #[error("Failed to run git in {}: {message}", path.display())]
    GitSpawn { path: PathBuf, message: String },

    /// A git command did not finish within the configured timeout.
    #[error("Git command timed out after {seconds}s in {}: git {command}", path.display())]
    Timeout {
        command: String,
        path: PathBuf,
        seconds: u64,
    },

    /// A permission change was refused for a single file or directory.
    #[error("Permission denied while changing mode of {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// An operation needed a mirror that is not on disk.
    #[error("Mirror '{name}' does not exist at {}, try running gpack install", path.display())]
    MissingMirror { name: String, path: PathBuf },

    /// The lock ledger could not be read or written.
    #[error("Lock ledger error at {}: {message}", path.display())]
    Ledger { path: PathBuf, message: String },

    /// A rinse failed to restore a clean working tree.
    #[error("Mirror '{name}' could not be restored to a clean state")]
    Irreconcilable { name: String },

    /// The SSH key named in the configuration could not be retrieved.
    #[error("Key retrieval error for {url}: {message}\n  hint: check the ssh_key entry under 'config' in GpackRepos")]
    KeyRetrieval { url: String, message: String },

    /// A worker panicked while processing a mirror.
    #[error("Worker for '{name}' panicked: {message}")]
    WorkerPanic { name: String, message: String },

    /// A mutex guarding shared state was poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
