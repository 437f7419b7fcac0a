//! Temporary SSH key for fleets whose remotes need a deploy key.
//!
//! The key named by the `config.ssh_key` entry of `GpackRepos` is downloaded
//! into the root directory for the duration of one command. The returned
//! [`KeyGuard`] deletes it again when dropped, including on error paths.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::defaults::KEY_FILENAME;
use crate::error::{Error, Result};
use crate::runner::CommandRunner;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the key file on disk and removes it on drop.
#[derive(Debug)]
pub struct KeyGuard {
    path: PathBuf,
}

impl KeyGuard {
    /// Writes `contents` to the key file under `root`, readable by the owner
    /// only.
    pub fn write(root: &Path, contents: &str) -> Result<Self> {
        let path = root.join(KEY_FILENAME);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        // the guard exists from here on so a failed write still cleans up
        let guard = Self { path };
        file.write_all(contents.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&guard.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value for `GIT_SSH_COMMAND` that makes git use this key.
    pub fn ssh_command(&self) -> String {
        format!("ssh -i {} -o IdentitiesOnly=yes", self.path.display())
    }

    /// A runner whose git commands authenticate with this key.
    pub fn configure(&self, runner: CommandRunner) -> CommandRunner {
        runner.with_env("GIT_SSH_COMMAND", &self.ssh_command())
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// Downloads the key at `url` and writes it under `root`.
pub fn install(root: &Path, url: &str) -> Result<KeyGuard> {
    let contents = download(url)?;
    let guard = KeyGuard::write(root, &contents)?;
    info!("installed ssh key from {}", url);
    Ok(guard)
}

fn download(url: &str) -> Result<String> {
    let retrieval_error = |message: String| Error::KeyRetrieval {
        url: url.to_string(),
        message,
    };

    let agent = ureq::AgentBuilder::new().timeout(DOWNLOAD_TIMEOUT).build();
    let response = agent
        .get(url)
        .set("User-Agent", concat!("gpack/", env!("CARGO_PKG_VERSION")))
        .call()
        .map_err(|e| retrieval_error(e.to_string()))?;

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| retrieval_error(format!("failed to read key: {}", e)))?;
    if body.trim().is_empty() {
        return Err(retrieval_error("empty response".to_string()));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_guard_writes_private_key_and_removes_it() {
        let temp = TempDir::new().unwrap();
        let path = {
            let guard = KeyGuard::write(temp.path(), "-----BEGIN KEY-----\n").unwrap();
            assert_eq!(fs::read_to_string(guard.path()).unwrap(), "-----BEGIN KEY-----\n");
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = fs::metadata(guard.path()).unwrap().permissions().mode();
                assert_eq!(mode & 0o777, 0o600);
            }
            guard.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_tolerates_file_removed_early() {
        let temp = TempDir::new().unwrap();
        let guard = KeyGuard::write(temp.path(), "key").unwrap();
        fs::remove_file(guard.path()).unwrap();
        drop(guard);
    }

    #[cfg(unix)]
    #[test]
    fn test_configured_runner_exports_ssh_command() {
        let temp = TempDir::new().unwrap();
        let guard = KeyGuard::write(temp.path(), "key").unwrap();
        assert!(guard.ssh_command().ends_with(".temp_ssh_key -o IdentitiesOnly=yes"));

        let runner = guard.configure(CommandRunner::new().with_program("sh"));
        let output = runner
            .run_checked(Path::new("."), &["-c", "printf %s \"$GIT_SSH_COMMAND\""])
            .unwrap();
        assert_eq!(output, guard.ssh_command());
    }

    #[test]
    fn test_unreachable_key_url_is_retrieval_error() {
        let temp = TempDir::new().unwrap();
        let err = install(temp.path(), "http://127.0.0.1:9/deploy-key").unwrap_err();
        assert!(matches!(err, Error::KeyRetrieval { .. }));
        assert!(!temp.path().join(KEY_FILENAME).exists());
    }
}
