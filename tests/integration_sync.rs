//! Integration tests that drive `gpack` against real git repositories.
//!
//! Every upstream is a local repository created inside the fixture, so the
//! tests need `git` on the path but no network.

mod common;
use common::prelude::*;

use gpack::permissions::is_owner_writable;

/// Environment needed for commands that create commits or annotated tags in
/// a mirror.
fn with_identity(cmd: &mut assert_cmd::Command) -> &mut assert_cmd::Command {
    cmd.env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
}

fn installed(name: &str, lock: bool) -> (TestFixture, std::path::PathBuf) {
    let fixture = TestFixture::new();
    let upstream = fixture.upstream(name);
    let fixture = fixture.with_config(&configs::single(name, &upstream, lock));
    fixture
        .command()
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{}: cloned", name)));
    (fixture, upstream)
}

fn head(dir: &std::path::Path) -> String {
    git(dir, &["rev-parse", "HEAD"]).trim().to_string()
}

#[test]
fn test_install_locks_mirror() {
    let (fixture, upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    assert!(mirror.join("README.md").exists());
    assert_eq!(head(&mirror), head(&upstream));
    assert!(!is_owner_writable(&mirror).unwrap());
    assert!(!is_owner_writable(&mirror.join("README.md")).unwrap());
    assert!(is_owner_writable(&mirror.join(".git")).unwrap());
    assert!(fixture.ledger_entries().is_empty());
}

#[test]
fn test_install_without_lock_records_unlocked_mirror() {
    let (fixture, _upstream) = installed("tools", false);
    let mirror = fixture.mirror("tools");

    assert!(is_owner_writable(&mirror.join("README.md")).unwrap());
    let entries = fixture.ledger_entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with("mirrors/tools"));
}

#[test]
fn test_install_twice_leaves_mirror_alone() {
    let (fixture, _upstream) = installed("core", true);
    fixture
        .command()
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("cloned").not());
}

#[test]
fn test_update_rinses_stray_file_in_locked_mirror() {
    let (fixture, _upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    make_writable(&mirror);
    std::fs::write(mirror.join("stray.txt"), "local edit").unwrap();
    fixture.command().arg("lock").assert().success();

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("core: not clean, rinsed"))
        .stdout(predicate::str::contains("1 mirror: 1 synced"));

    assert!(!mirror.join("stray.txt").exists());
    assert!(!is_owner_writable(&mirror.join("README.md")).unwrap());
    assert!(fixture.ledger_entries().is_empty());
}

#[test]
fn test_update_pulls_new_upstream_commits() {
    let (fixture, upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    commit(&upstream, "lib.rs", "pub fn one() {}\n");
    commit(&upstream, "main.rs", "fn main() {}\n");

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("core: commits didn't match, pulled"));

    assert!(mirror.join("main.rs").exists());
    assert_eq!(head(&mirror), head(&upstream));
    assert!(!is_owner_writable(&mirror.join("main.rs")).unwrap());
    assert!(fixture.ledger_entries().is_empty());
}

#[test]
fn test_update_leaves_dirty_unlocked_mirror_alone() {
    let (fixture, upstream) = installed("core", true);
    let mirror = fixture.mirror("core");
    let before = head(&mirror);

    fixture.command().args(["unlock", "core"]).assert().success();
    std::fs::write(mirror.join("wip.txt"), "work in progress").unwrap();
    commit(&upstream, "lib.rs", "pub fn one() {}\n");

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("not synchronized"));

    assert!(mirror.join("wip.txt").exists());
    assert_eq!(head(&mirror), before);
    assert!(is_owner_writable(&mirror.join("README.md")).unwrap());
}

#[test]
fn test_update_clones_missing_mirror() {
    let fixture = TestFixture::new();
    let upstream = fixture.upstream("core");
    let fixture = fixture.with_config(&configs::single("core", &upstream, true));

    fixture
        .command()
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("core: cloned"));
    assert!(fixture.mirror("core").join("README.md").exists());
}

#[test]
fn test_lock_prunes_deleted_mirror_from_ledger() {
    let (fixture, _upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    fixture.command().args(["unlock", "core"]).assert().success();
    assert_eq!(fixture.ledger_entries().len(), 1);

    std::fs::remove_dir_all(&mirror).unwrap();
    fixture
        .command()
        .arg("lock")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed from lock ledger"));
    assert!(fixture.ledger_entries().is_empty());
}

#[test]
fn test_clean_restores_tree_and_keeps_lock() {
    let (fixture, _upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    make_writable(&mirror);
    std::fs::write(mirror.join("README.md"), "edited").unwrap();
    fixture.command().arg("lock").assert().success();

    fixture.command().arg("clean").assert().success();
    assert_eq!(
        std::fs::read_to_string(mirror.join("README.md")).unwrap(),
        "# core\n"
    );
    assert!(!is_owner_writable(&mirror.join("README.md")).unwrap());
}

#[test]
fn test_check_fails_on_dirty_locked_mirror() {
    let (fixture, _upstream) = installed("core", true);
    let mirror = fixture.mirror("core");

    fixture
        .command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("core (main): locked, clean, up to date"));

    make_writable(&mirror);
    std::fs::write(mirror.join("stray.txt"), "x").unwrap();
    fixture.command().arg("lock").assert().success();

    fixture
        .command()
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("locked, dirty"))
        .stderr(predicate::str::contains("dirty or diverged: core"));
}

#[test]
fn test_check_json_reports_installed_mirror() {
    let (fixture, _upstream) = installed("core", true);

    let output = fixture.command().args(["check", "--json"]).output().unwrap();
    assert!(output.status.success());
    let statuses: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(statuses[0]["exists"], true);
    assert_eq!(statuses[0]["locked"], true);
    assert_eq!(statuses[0]["clean"], true);
    assert_eq!(statuses[0]["commits_match"], true);
    assert_eq!(statuses[0]["branch"], "main");
}

#[test]
fn test_uninstall_removes_locked_mirror() {
    let (fixture, _upstream) = installed("core", true);

    fixture
        .command()
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("core: removed"));
    assert!(!fixture.mirror("core").exists());
}

#[test]
fn test_purge_reinstalls_fleet() {
    let (fixture, _upstream) = installed("core", true);
    let mirror = fixture.mirror("core");
    make_writable(&mirror);
    std::fs::write(mirror.join("stray.txt"), "x").unwrap();

    fixture.command().arg("purge").assert().success();
    assert!(mirror.join("README.md").exists());
    assert!(!mirror.join("stray.txt").exists());
    assert!(!is_owner_writable(&mirror.join("README.md")).unwrap());
}

#[test]
fn test_branch_and_checkout() {
    let (fixture, _upstream) = installed("core", true);

    fixture
        .command()
        .args(["branch", "core"])
        .assert()
        .success()
        .stdout("'core' is currently on branch 'main'\n");

    fixture
        .command()
        .args(["checkout", "core", "feature", "--create"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gpack unlock core"));

    fixture.command().args(["unlock", "core"]).assert().success();
    fixture
        .command()
        .args(["checkout", "core", "feature", "--create"])
        .assert()
        .success();
    fixture
        .command()
        .args(["branch", "core"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'feature'"));
}

#[test]
fn test_tag_creates_build_branch() {
    let (fixture, _upstream) = installed("core", false);
    let mirror = fixture.mirror("core");

    with_identity(&mut fixture.command())
        .args(["tag", "core", "v1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created tag v1.0 in core"))
        .stdout(predicate::str::contains("'build_v1.0'"));

    assert_eq!(git(&mirror, &["tag", "-l"]).trim(), "v1.0");
    fixture
        .command()
        .args(["tag", "core"])
        .assert()
        .success()
        .stdout("Available tags for core: v1.0\n");
}

#[test]
fn test_push_refuses_tracked_branch_and_pushes_feature() {
    let (fixture, upstream) = installed("core", false);
    let mirror = fixture.mirror("core");

    std::fs::write(mirror.join("feature.txt"), "new").unwrap();
    with_identity(&mut fixture.command())
        .args(["push", "core", "-m", "add feature"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("protected branch 'main'"));

    fixture
        .command()
        .args(["checkout", "core", "feature", "--create"])
        .assert()
        .success();
    with_identity(&mut fixture.command())
        .args(["push", "core", "-m", "add feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pushed core to origin/feature"));

    let branches = git(&upstream, &["branch", "--list", "feature"]);
    assert!(branches.contains("feature"));
}

#[test]
fn test_orchestrator_recovers_fleet_in_parallel() {
    use gpack::config;
    use gpack::executor::run_over_fleet;
    use gpack::git::SystemGit;
    use gpack::ledger::LockLedger;
    use gpack::recovery::{MirrorState, Orchestrator};

    let fixture = TestFixture::new();
    let mut yaml = String::new();
    let mut upstreams = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let upstream = fixture.upstream(name);
        yaml.push_str(&configs::entry(name, &upstream, true));
        upstreams.push(upstream);
    }
    let fleet = config::parse(fixture.path(), &yaml).unwrap();
    let git = SystemGit::default();
    let ledger = LockLedger::new(fixture.ledger_path());
    let orchestrator = Orchestrator::new(&git, &ledger);

    let reports: Vec<_> = run_over_fleet(&fleet.repositories, true, |repo| {
        Ok(orchestrator.update_or_reclone(repo))
    })
    .into_iter()
    .map(Result::unwrap)
    .collect();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.state == MirrorState::Synced));

    commit(&upstreams[1], "next.txt", "next");
    let reports: Vec<_> = run_over_fleet(&fleet.repositories, true, |repo| {
        Ok(orchestrator.update_or_reclone(repo))
    })
    .into_iter()
    .map(Result::unwrap)
    .collect();
    assert_eq!(reports[1].name, "beta");
    assert!(reports.iter().all(|r| r.state == MirrorState::Synced));
    assert!(fixture.mirror("beta").join("next.txt").exists());
    assert!(ledger.entries().unwrap().is_empty());
}
