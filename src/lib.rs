//! # gpack
//!
//! gpack keeps a fleet of local git mirrors in a known state. Each mirror is
//! either **locked** (read-only on disk and expected to match
//! `origin/<branch>` exactly) or **unlocked** (writable, holding local work).
//! On demand, gpack reconciles drift between a mirror and its remote.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use gpack::config;
//! use gpack::defaults;
//! use gpack::git::SystemGit;
//! use gpack::ledger::LockLedger;
//! use gpack::recovery::Orchestrator;
//!
//! let root = Path::new("/srv/fleet");
//! let fleet = config::from_file(root, &defaults::config_path(root)).unwrap();
//! let git = SystemGit::default();
//! let ledger = LockLedger::new(defaults::ledger_path(root));
//! let orchestrator = Orchestrator::new(&git, &ledger);
//!
//! for repo in &fleet.repositories {
//!     let report = orchestrator.update_or_reclone(repo);
//!     println!("{}: {}", report.name, report.state);
//! }
//! ```
//!
//! ## Core Concepts
//!
//! - **Repository descriptors (`repository`)**: immutable identity of one
//!   mirror, loaded once per run from `GpackRepos` (`config`).
//! - **Command runner (`runner`)**: runs git with an explicit working
//!   directory and a timeout. The process working directory never changes.
//! - **Lock ledger (`ledger`)**: the `.gpacklock` file listing unlocked
//!   mirrors. It is the source of truth for lock state; updates are
//!   serialized and written atomically.
//! - **Permission enforcer (`permissions`)**: projects lock state onto the
//!   owner-write bit of every file and directory outside `.git`.
//! - **Drift detector (`drift`)**: is the tree clean, and does history match
//!   the remote?
//! - **Recovery orchestrator (`recovery`)**: the per-mirror state machine and
//!   its delete-and-reclone fallback.
//! - **Parallel executor (`executor`)**: runs a per-mirror operation across
//!   the fleet on the rayon pool, isolating failures and panics.

pub mod config;
pub mod defaults;
pub mod drift;
pub mod error;
pub mod executor;
pub mod git;
pub mod keys;
pub mod ledger;
pub mod output;
pub mod permissions;
pub mod recovery;
pub mod repository;
pub mod runner;
pub mod suggestions;
