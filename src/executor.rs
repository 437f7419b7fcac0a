//! Fleet-wide dispatch of a per-mirror operation.
//!
//! Mirrors never share a working tree and the ledger serializes its own
//! updates, so workers need no further coordination. Results come back in
//! the order of the input slice; execution order is unspecified.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::repository::Repository;

/// Applies `op` to every repository, on the rayon pool when `allow_parallel`
/// is set and one after another otherwise.
///
/// A panicking worker becomes an [`Error::WorkerPanic`] for its own mirror;
/// the remaining mirrors still run.
pub fn run_over_fleet<T, F>(repos: &[Repository], allow_parallel: bool, op: F) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(&Repository) -> Result<T> + Sync + Send,
{
    let guarded = |repo: &Repository| -> Result<T> {
        match catch_unwind(AssertUnwindSafe(|| op(repo))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("{}: worker panicked: {}", repo.name, message);
                Err(Error::WorkerPanic {
                    name: repo.name.clone(),
                    message,
                })
            }
        }
    };

    if allow_parallel {
        debug!(
            "running over {} mirrors on {} threads",
            repos.len(),
            rayon::current_num_threads()
        );
        repos.par_iter().map(guarded).collect()
    } else {
        debug!("running over {} mirrors sequentially", repos.len());
        repos.iter().map(guarded).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
