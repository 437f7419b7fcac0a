//! # Lock Ledger
//!
//! The ledger is the persisted set of mirrors that are currently *unlocked*.
//! A mirror whose path is absent from the ledger is locked and must be
//! read-only on disk; the filesystem permissions are a projection of the
//! ledger, never the other way round.
//!
//! ## File format
//!
//! Plain text, one absolute mirror path per line, blank lines ignored. A
//! missing file is an empty ledger and is created on first access.
//!
//! ## Concurrency
//!
//! Every change is a whole-file read-modify-write. It is serialized twice:
//! by a mutex for workers inside this process and by an exclusive advisory
//! lock on a sidecar `<ledger>.lock` file for other gpack processes. The new
//! contents are written to a temporary file and renamed over the ledger, so
//! an interrupted write leaves the previous ledger intact.
//!
//! Entries whose mirror no longer exists are pruned on every change.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::permissions::{self, Action, PermissionReport};
use crate::repository::Repository;

/// What a lock or unlock call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// The ledger was updated and permissions were enforced.
    Applied(PermissionReport),
    /// The mirror is not on disk; nothing was enforced.
    Missing,
    /// The mirror is not on disk and its stale ledger entry was removed.
    Pruned,
}

/// Persisted set of unlocked mirror paths.
#[derive(Debug)]
pub struct LockLedger {
    path: PathBuf,
    guard: Mutex<()>,
}

impl LockLedger {
    /// Creates a ledger backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current set of unlocked paths.
    pub fn entries(&self) -> Result<BTreeSet<PathBuf>> {
        let _guard = self.acquire()?;
        self.read()
    }

    /// Whether `path` is recorded as unlocked.
    pub fn is_unlocked(&self, path: &Path) -> Result<bool> {
        Ok(self.entries()?.contains(path))
    }

    /// Whether the mirror is locked, i.e. absent from the ledger.
    pub fn is_locked(&self, repo: &Repository) -> Result<bool> {
        Ok(!self.is_unlocked(&repo.path)?)
    }

    /// Removes the mirror from the ledger and strips write permission from
    /// its tree.
    ///
    /// A mirror that is not on disk only loses its stale ledger entry.
    pub fn lock(&self, repo: &Repository) -> Result<LedgerChange> {
        let exists = repo.exists();
        let mut removed = false;
        self.update(|entries| {
            removed = entries.remove(&repo.path);
        })?;

        if !exists {
            return Ok(if removed {
                info!("pruned stale ledger entry for {}", repo.path.display());
                LedgerChange::Pruned
            } else {
                LedgerChange::Missing
            });
        }

        let report = permissions::apply(&repo.path, Action::Lock)?;
        info!("locked {}", repo.name);
        Ok(LedgerChange::Applied(report))
    }

    /// Records the mirror as unlocked and grants write permission on its
    /// tree. A mirror that is not on disk is left alone.
    pub fn unlock(&self, repo: &Repository) -> Result<LedgerChange> {
        if !repo.exists() {
            return Ok(LedgerChange::Missing);
        }

        self.update(|entries| {
            entries.insert(repo.path.clone());
        })?;

        let report = permissions::apply(&repo.path, Action::Unlock)?;
        info!("unlocked {}", repo.name);
        Ok(LedgerChange::Applied(report))
    }

    /// Runs a read-modify-write of the whole ledger under both locks.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeSet<PathBuf>),
    {
        let _guard = self.acquire()?;
        let mut entries = self.read()?;
        change(&mut entries);

        let before = entries.len();
        entries.retain(|path| path.is_dir());
        if entries.len() != before {
            debug!("pruned {} stale ledger entries", before - entries.len());
        }

        self.write(&entries)
    }

    /// Takes the in-process mutex and the cross-process file lock. Both are
    /// released when the returned guard drops.
    fn acquire(&self) -> Result<LedgerGuard<'_>> {
        let mutex = self.guard.lock().map_err(|_| Error::LockPoisoned {
            context: format!("lock ledger {}", self.path.display()),
        })?;

        let lock_path = sidecar_path(&self.path);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| self.error(format!("failed to open {}: {}", lock_path.display(), e)))?;
        file.lock_exclusive()
            .map_err(|e| self.error(format!("failed to lock {}: {}", lock_path.display(), e)))?;

        Ok(LedgerGuard {
            _file: file,
            _mutex: mutex,
        })
    }

    /// Reads the ledger, creating an empty one if it does not exist.
    fn read(&self) -> Result<BTreeSet<PathBuf>> {
        match fs::read(&self.path) {
            Ok(contents) => Ok(parse(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                File::create(&self.path)
                    .map_err(|e| self.error(format!("failed to create ledger: {}", e)))?;
                Ok(BTreeSet::new())
            }
            Err(e) => Err(self.error(format!("failed to read ledger: {}", e))),
        }
    }

    fn write(&self, entries: &BTreeSet<PathBuf>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| self.error(format!("failed to create temp file: {}", e)))?;
        temp.write_all(&render(entries))
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| self.error(format!("failed to write temp file: {}", e)))?;
        make_shareable(temp.path())
            .map_err(|e| self.error(format!("failed to set ledger mode: {}", e)))?;
        temp.persist(&self.path)
            .map_err(|e| self.error(format!("failed to replace ledger: {}", e)))?;
        Ok(())
    }

    fn error(&self, message: String) -> Error {
        Error::Ledger {
            path: self.path.clone(),
            message,
        }
    }
}

struct LedgerGuard<'a> {
    _file: File,
    _mutex: std::sync::MutexGuard<'a, ()>,
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn parse(contents: &[u8]) -> BTreeSet<PathBuf> {
    contents
        .split(|&byte| byte == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .map(path_from_bytes)
        .collect()
}

fn render(entries: &BTreeSet<PathBuf>) -> Vec<u8> {
    let mut contents = Vec::new();
    for path in entries {
        contents.extend_from_slice(&path_to_bytes(path));
        contents.push(b'\n');
    }
    contents
}

// paths are stored byte for byte, so non-UTF-8 names read back unchanged
#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    Cow::Owned(path.to_string_lossy().into_owned().into_bytes())
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(unix)]
fn make_shareable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_shareable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::is_owner_writable;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        ledger: LockLedger,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let ledger = LockLedger::new(temp.path().join(".gpacklock"));
            Self { temp, ledger }
        }

        fn mirror(&self, name: &str) -> Repository {
            let repo = Repository::new(self.temp.path(), "unused", name, "main", true);
            fs::create_dir_all(repo.path.join("src")).unwrap();
            fs::write(repo.path.join("src/lib.rs"), "lib").unwrap();
            repo
        }

        fn absent(&self, name: &str) -> Repository {
            Repository::new(self.temp.path(), "unused", name, "main", true)
        }
    }

    #[test]
    fn test_missing_file_is_empty_and_created() {
        let fixture = Fixture::new();
        assert!(!fixture.ledger.path().exists());
        assert!(fixture.ledger.entries().unwrap().is_empty());
        assert!(fixture.ledger.path().exists());
    }

    #[test]
    fn test_parse_ignores_blank_lines_and_whitespace() {
        let entries = parse(b"/a/b\n\n  /c/d  \n\n");
        let expected: BTreeSet<PathBuf> = [PathBuf::from("/a/b"), PathBuf::from("/c/d")]
            .into_iter()
            .collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_unlock_records_path_and_grants_write() {
        let fixture = Fixture::new();
        let repo = fixture.mirror("core");
        fixture.ledger.lock(&repo).unwrap();
        assert!(!is_owner_writable(&repo.path.join("src/lib.rs")).unwrap());

        let change = fixture.ledger.unlock(&repo).unwrap();
        assert!(matches!(change, LedgerChange::Applied(_)));
        assert!(fixture.ledger.is_unlocked(&repo.path).unwrap());
        assert!(is_owner_writable(&repo.path.join("src/lib.rs")).unwrap());

        let contents = fs::read_to_string(fixture.ledger.path()).unwrap();
        assert_eq!(contents, format!("{}\n", repo.path.display()));
    }

    #[test]
    fn test_lock_removes_path_and_strips_write() {
        let fixture = Fixture::new();
        let repo = fixture.mirror("core");
        fixture.ledger.unlock(&repo).unwrap();

        fixture.ledger.lock(&repo).unwrap();
        assert!(!fixture.ledger.is_unlocked(&repo.path).unwrap());
        assert!(fixture.ledger.is_locked(&repo).unwrap());
        assert!(!is_owner_writable(&repo.path).unwrap());
        assert!(!is_owner_writable(&repo.path.join("src/lib.rs")).unwrap());

        fixture.ledger.unlock(&repo).unwrap();
    }

    #[test]
    fn test_lock_and_unlock_are_idempotent() {
        let fixture = Fixture::new();
        let repo = fixture.mirror("core");

        fixture.ledger.unlock(&repo).unwrap();
        let once = fixture.ledger.entries().unwrap();
        fixture.ledger.unlock(&repo).unwrap();
        assert_eq!(fixture.ledger.entries().unwrap(), once);
        assert!(is_owner_writable(&repo.path).unwrap());

        fixture.ledger.lock(&repo).unwrap();
        let once = fixture.ledger.entries().unwrap();
        let second = fixture.ledger.lock(&repo).unwrap();
        assert_eq!(fixture.ledger.entries().unwrap(), once);
        assert_eq!(
            second,
            LedgerChange::Applied(PermissionReport::default())
        );
        assert!(!is_owner_writable(&repo.path).unwrap());

        fixture.ledger.unlock(&repo).unwrap();
    }

    #[test]
    fn test_unlock_missing_mirror_has_no_effect() {
        let fixture = Fixture::new();
        let repo = fixture.absent("ghost");
        assert_eq!(fixture.ledger.unlock(&repo).unwrap(), LedgerChange::Missing);
        assert!(fixture.ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_lock_prunes_entry_of_deleted_mirror() {
        let fixture = Fixture::new();
        let repo = fixture.mirror("core");
        fixture.ledger.unlock(&repo).unwrap();
        fs::remove_dir_all(&repo.path).unwrap();

        assert_eq!(fixture.ledger.lock(&repo).unwrap(), LedgerChange::Pruned);
        assert!(fixture.ledger.entries().unwrap().is_empty());
        assert!(!repo.path.exists());
    }

    #[test]
    fn test_lock_missing_mirror_without_entry() {
        let fixture = Fixture::new();
        let repo = fixture.absent("ghost");
        assert_eq!(fixture.ledger.lock(&repo).unwrap(), LedgerChange::Missing);
    }

    #[test]
    fn test_any_change_prunes_other_stale_entries() {
        let fixture = Fixture::new();
        let stale = fixture.mirror("stale");
        let live = fixture.mirror("live");
        fixture.ledger.unlock(&stale).unwrap();
        fs::remove_dir_all(&stale.path).unwrap();

        fixture.ledger.unlock(&live).unwrap();
        let entries = fixture.ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains(&live.path));
    }

    #[test]
    fn test_concurrent_unlocks_do_not_lose_updates() {
        let fixture = Arc::new(Fixture::new());
        let repos: Vec<Repository> = (0..16)
            .map(|i| fixture.mirror(&format!("mirror-{}", i)))
            .collect();

        let handles: Vec<_> = repos
            .iter()
            .cloned()
            .map(|repo| {
                let fixture = Arc::clone(&fixture);
                std::thread::spawn(move || fixture.ledger.unlock(&repo).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = fixture.ledger.entries().unwrap();
        assert_eq!(entries.len(), repos.len());
        for repo in &repos {
            assert!(entries.contains(&repo.path));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_mirror_path_round_trips() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fixture = Fixture::new();
        let mut repo = fixture.mirror("placeholder");
        repo.path = fixture.temp.path().join(OsStr::from_bytes(b"mirror-\xff"));
        fs::create_dir_all(&repo.path).unwrap();

        fixture.ledger.unlock(&repo).unwrap();
        assert!(fixture.ledger.is_unlocked(&repo.path).unwrap());
        assert!(!fixture.ledger.is_locked(&repo).unwrap());

        fixture.ledger.lock(&repo).unwrap();
        assert!(fixture.ledger.entries().unwrap().is_empty());
        fixture.ledger.unlock(&repo).unwrap();
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/work/.gpacklock")),
            PathBuf::from("/work/.gpacklock.lock")
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Whatever sequence of lock/unlock calls runs, the ledger holds
            /// exactly the mirrors whose last call was an unlock.
            #[test]
            fn ledger_tracks_last_action(ops in prop::collection::vec((0usize..4, any::<bool>()), 0..24)) {
                let fixture = Fixture::new();
                let repos: Vec<Repository> = (0..4)
                    .map(|i| fixture.mirror(&format!("m{}", i)))
                    .collect();
                for repo in &repos {
                    fixture.ledger.lock(repo).unwrap();
                }

                let mut expected = BTreeSet::new();
                for (index, unlock) in ops {
                    let repo = &repos[index];
                    if unlock {
                        fixture.ledger.unlock(repo).unwrap();
                        expected.insert(repo.path.clone());
                    } else {
                        fixture.ledger.lock(repo).unwrap();
                        expected.remove(&repo.path);
                    }
                }

                prop_assert_eq!(fixture.ledger.entries().unwrap(), expected);
                for repo in &repos {
                    prop_assert_eq!(
                        is_owner_writable(&repo.path).unwrap(),
                        fixture.ledger.is_unlocked(&repo.path).unwrap()
                    );
                    fixture.ledger.unlock(repo).unwrap();
                }
            }
        }
    }
}
