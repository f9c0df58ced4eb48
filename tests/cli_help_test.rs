// Command-line behavior that needs no GitHub access

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pr_sweep(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pr-sweep").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("GH_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_no_subcommand_shows_help() {
    let dir = TempDir::new().unwrap();
    pr_sweep(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("close"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn test_help_lists_global_flags() {
    let dir = TempDir::new().unwrap();
    pr_sweep(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--max-iterations"))
        .stdout(predicate::str::contains("--workdir"));
}

#[test]
fn test_close_without_confirmation_is_refused() {
    let dir = TempDir::new().unwrap();
    pr_sweep(&dir)
        .args(["close", "--confirm", "close"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("without confirmation"));

    // Nothing is written when the run is refused
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_token_is_reported_with_hints() {
    let dir = TempDir::new().unwrap();
    pr_sweep(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("token"))
        .stderr(predicate::str::contains("Troubleshooting"));
}

#[test]
fn test_init_config_writes_file_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");

    pr_sweep(&dir)
        .args(["init-config", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[sweep]"));

    pr_sweep(&dir)
        .args(["init-config", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--overwrite"));
}

#[test]
fn test_invalid_start_level_in_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pr-sweep.toml"), "[sweep]\nstart_level = 11\n").unwrap();

    pr_sweep(&dir).arg("status").assert().failure();
}
