//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new();
//!     let upstream = fixture.upstream("core");
//!     let fixture = fixture.with_config(&configs::single("core", &upstream, true));
//!     fixture.command().arg("install").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{commit, git, make_writable};
    pub use super::TestFixture;
}

/// `GpackRepos` snippets.
#[allow(dead_code)]
pub mod configs {
    use std::path::Path;

    /// One mirror under `mirrors/<name>` tracking `main`.
    pub fn single(name: &str, upstream: &Path, lock: bool) -> String {
        entry(name, upstream, lock)
    }

    /// A mirror entry; `lock: false` is only written when needed.
    pub fn entry(name: &str, upstream: &Path, lock: bool) -> String {
        let mut yaml = format!(
            "{name}:\n  url: {url}\n  local_dir: mirrors/{name}\n  branch: main\n",
            url = upstream.display()
        );
        if !lock {
            yaml.push_str("  lock: false\n");
        }
        yaml
    }

    /// Two mirrors pointing at the same remote.
    pub const STATIC: &str = r#"
core:
  url: https://example.com/team/core.git
  local_dir: libs/core
  branch: main

tools:
  url: https://example.com/team/tools.git
  local_dir: tools
  branch: develop
  lock: false
"#;

    pub const INVALID_YAML: &str = "core: [unclosed";
}

/// Runs git in `dir` and panics with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Writes `file` and commits it.
pub fn commit(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), content).expect("failed to write file");
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", &format!("update {}", file)]);
}

/// Restores the owner-write bit on `path` so a test can plant files in a
/// locked tree.
pub fn make_writable(path: &Path) {
    let _ = gpack::permissions::apply(path, gpack::permissions::Action::Unlock);
}

/// A temporary fleet root.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes `GpackRepos` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("GpackRepos")
            .write_str(content)
            .expect("Failed to write GpackRepos");
        self
    }

    /// Creates an upstream repository with one commit on `main`, outside
    /// the mirror directory.
    pub fn upstream(&self, name: &str) -> PathBuf {
        let dir = self.path().join("upstreams").join(name);
        fs::create_dir_all(&dir).expect("Failed to create upstream");
        git(&dir, &["init", "-b", "main"]);
        git(&dir, &["config", "user.email", "test@example.com"]);
        git(&dir, &["config", "user.name", "Test User"]);
        git(&dir, &["config", "commit.gpgsign", "false"]);
        commit(&dir, "README.md", &format!("# {}\n", name));
        dir
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn mirror(&self, name: &str) -> PathBuf {
        self.path().join("mirrors").join(name)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.path().join(".gpacklock")
    }

    /// Lines of the lock ledger, or nothing when it was never created.
    pub fn ledger_entries(&self) -> Vec<String> {
        fs::read_to_string(self.ledger_path())
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// A `gpack` command rooted at this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gpack");
        cmd.current_dir(self.path())
            .env_remove("GPACK_ROOT")
            .env_remove("GPACK_LOG")
            .env_remove("GPACK_TIMEOUT")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        // locked mirrors cannot be removed by their owner
        let mirrors = self.path().join("mirrors");
        if mirrors.exists() {
            make_writable(&mirrors);
        }
    }
}
