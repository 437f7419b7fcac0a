//! # Fleet Configuration
//!
//! Loads the `GpackRepos` file into a [`Fleet`]. The file is a YAML mapping
//! from an entry name to a repository:
//!
//! ```yaml
//! config:
//!   ssh_key: https://keys.example.com/deploy
//!
//! core:
//!   url: git@example.com:team/core.git
//!   local_dir: libs/core
//!   branch: main
//!
//! tools:
//!   url: git@example.com:team/tools.git
//!   local_dir: tools
//!   branch: develop
//!   lock: false
//! ```
//!
//! The `config` key is reserved and never names a repository. `lock`
//! defaults to `true`. Repositories are addressed on the command line by the
//! last segment of their `local_dir`, not by their entry name.
//!
//! Configuration is read once per run and passed around explicitly.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::defaults::CONFIG_SECTION;
use crate::error::{Error, Result};
use crate::repository::{normalize, Repository};

/// One repository entry as written in `GpackRepos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoEntry {
    pub url: String,
    pub local_dir: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<bool>,
}

/// The reserved `config` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigSection {
    /// URL of a private key used for git over SSH.
    #[serde(default, alias = "key")]
    pub ssh_key: Option<String>,
}

/// Every configured mirror, resolved against the root directory.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    pub repositories: Vec<Repository>,
    pub key_url: Option<String>,
}

impl Fleet {
    /// Names accepted on the command line, in file order.
    pub fn names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }

    /// Looks up a repository by name.
    pub fn find(&self, name: &str) -> Result<&Repository> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name)
            .ok_or_else(|| Error::UnknownRepository {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// The named repository, or the whole fleet when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<Repository>> {
        match name {
            Some(name) => Ok(vec![self.find(name)?.clone()]),
            None => Ok(self.repositories.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// Parses `GpackRepos` content, resolving every `local_dir` against `root`.
pub fn parse(root: &Path, yaml_content: &str) -> Result<Fleet> {
    let document: Option<Mapping> = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some("GpackRepos must be a mapping of names to url/local_dir/branch entries".to_string()),
    })?;
    let Some(document) = document else {
        return Ok(Fleet::default());
    };

    let mut fleet = Fleet::default();
    let mut entries: Vec<String> = Vec::new();
    for (key, value) in document {
        let key = entry_name(&key)?;
        if key == CONFIG_SECTION {
            let section: ConfigSection =
                serde_yaml::from_value(value).map_err(|e| Error::ConfigParse {
                    message: format!("invalid '{}' section: {}", CONFIG_SECTION, e),
                    hint: Some("Use 'ssh_key: <url>'".to_string()),
                })?;
            fleet.key_url = section.ssh_key;
            continue;
        }

        let entry: RepoEntry = serde_yaml::from_value(value).map_err(|e| Error::ConfigParse {
            message: format!("invalid entry '{}': {}", key, e),
            hint: Some("Each entry needs 'url', 'local_dir' and 'branch'; 'lock' is optional".to_string()),
        })?;
        let repo = Repository::new(
            root,
            &entry.url,
            &entry.local_dir,
            &entry.branch,
            entry.lock.unwrap_or(true),
        );
        check_local_dir(root, &key, &entry.local_dir, &repo)?;

        if let Some(index) = fleet.repositories.iter().position(|r| r.path == repo.path) {
            return Err(Error::DuplicatePath {
                first: entries[index].clone(),
                second: key,
                path: repo.path,
            });
        }
        if let Some(index) = fleet.repositories.iter().position(|r| r.name == repo.name) {
            return Err(Error::DuplicateName {
                first: entries[index].clone(),
                second: key,
                name: repo.name,
            });
        }
        entries.push(key);
        fleet.repositories.push(repo);
    }
    Ok(fleet)
}

/// Reads and parses a `GpackRepos` file.
pub fn from_file(root: &Path, path: &Path) -> Result<Fleet> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::ConfigParse {
            message: format!("{} not found", path.display()),
            hint: Some("Add a repository with: gpack add <url> <dir> <branch>".to_string()),
        },
        _ => Error::Io(e),
    })?;
    parse(root, &content)
}

/// Appends an entry to `GpackRepos`, creating the file if needed.
///
/// The entry name and the resolved directory must not clash with an
/// existing entry.
pub fn append_entry(root: &Path, path: &Path, name: &str, entry: &RepoEntry) -> Result<()> {
    if name == CONFIG_SECTION {
        return Err(Error::ConfigParse {
            message: format!("'{}' is reserved", CONFIG_SECTION),
            hint: Some("Pick another name with --name".to_string()),
        });
    }

    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };
    let document: Option<Mapping> = serde_yaml::from_str(&existing)?;
    if document
        .as_ref()
        .is_some_and(|doc| doc.contains_key(name))
    {
        return Err(Error::ConfigParse {
            message: format!("an entry named '{}' already exists", name),
            hint: Some("Pick another name with --name".to_string()),
        });
    }

    // validates the new entry against the rest of the fleet
    let mut mapping = Mapping::new();
    mapping.insert(Value::String(name.to_string()), serde_yaml::to_value(entry)?);
    let addition = serde_yaml::to_string(&mapping)?;
    parse(root, &format!("{}\n{}", existing, addition))?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.write_all(b"\n")?;
    file.write_all(addition.as_bytes())?;
    Ok(())
}

/// A mirror must live strictly below the root: removing or locking it must
/// never reach the root itself or anything outside it.
fn check_local_dir(root: &Path, key: &str, local_dir: &str, repo: &Repository) -> Result<()> {
    let invalid = |reason: &str| Error::ConfigParse {
        message: format!("invalid local_dir '{}' for '{}': {}", local_dir, key, reason),
        hint: Some("Use a relative directory below the root, e.g. 'libs/core'".to_string()),
    };

    let dir = Path::new(local_dir);
    if local_dir.trim().is_empty() {
        return Err(invalid("it is empty"));
    }
    if dir.is_absolute() || dir.has_root() {
        return Err(invalid("it must be relative to the root"));
    }
    let root = normalize(root);
    if repo.path == root {
        return Err(invalid("it resolves to the root directory"));
    }
    if !repo.path.starts_with(&root) {
        return Err(invalid("it resolves outside the root directory"));
    }
    Ok(())
}

fn entry_name(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::ConfigParse {
            message: format!("entry names must be strings, found {:?}", other),
            hint: None,
        }),
    }
}
