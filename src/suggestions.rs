//! # Error Suggestions
//!
//! Helpers that build CLI errors carrying a `hint:` on how to fix them.
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("GpackRepos not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

use crate::error::Error;

/// The `GpackRepos` file is missing.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "GpackRepos not found: {path}\n\n\
         hint: Add a repository with 'gpack add <url> <dir> <branch>'\n\
         hint: Use --root or --config to point at an existing fleet\n\
         hint: Set the GPACK_ROOT environment variable",
        path = path.display()
    )
}

/// A repository name on the command line matches no configured mirror.
pub fn unknown_repository(name: &str, known: &[&str]) -> anyhow::Error {
    let did_you_mean = find_similar(name, known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();
    let listing = if known.is_empty() {
        "No repositories are configured".to_string()
    } else {
        format!("Known repositories: {}", known.join(", "))
    };

    anyhow::anyhow!(
        "Unknown repository: {name}{did_you_mean}\n\n\
         {listing}\n\
         hint: Run 'gpack list' to see every configured name"
    )
}

/// A command needs a mirror that has not been cloned.
pub fn mirror_not_installed(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{name} does not exist\n\n\
         hint: Run 'gpack install' to clone missing mirrors"
    )
}

/// A command that edits the working tree was run on a locked mirror.
pub fn mirror_locked(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{name} is locked\n\n\
         hint: Run 'gpack unlock {name}' before changing its working tree"
    )
}

/// `push` was asked to push a branch gpack keeps in sync with the remote.
pub fn protected_branch(name: &str, branch: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Refusing to push {name} from protected branch '{branch}'\n\n\
         hint: Create a working branch first with 'gpack checkout {name} <branch> --create'"
    )
}

/// Converts library errors into CLI errors, adding hints where one helps.
pub fn explain(error: Error) -> anyhow::Error {
    match error {
        Error::KeyRetrieval { url, message } => anyhow::anyhow!(
            "Could not download the ssh key from {url}: {message}\n\n\
             hint: Check the 'ssh_key' entry of the 'config' section in GpackRepos"
        ),
        Error::MissingMirror { name, .. } => mirror_not_installed(&name),
        Error::Ledger { path, message } => anyhow::anyhow!(
            "Lock ledger {path} could not be updated: {message}\n\n\
             hint: Check that the root directory is writable",
            path = path.display()
        ),
        other => anyhow::Error::new(other),
    }
}

/// Returns a candidate within edit distance 2 of `input`, if any.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // single rolling row
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, a_char) in a_chars.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b_chars.len()]
}
