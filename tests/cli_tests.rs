#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.env_remove("PROGRAMME_ENGINE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn compute_prints_chained_dates() {
    cli()
        .write_stdin("start 2024-01-01\nadd 1-L1 5\nadd 1-L2 3 0 FS\ncompute\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Entry added at sequence order 1."))
        .stdout(predicate::str::contains("Recalculated (2 entries, 2 changed, 0 fallbacks)"))
        .stdout(predicate::str::contains("2024-01-08"))
        .stdout(predicate::str::contains("2024-01-10"));
}

#[test]
fn compute_without_start_reports_error() {
    cli()
        .write_stdin("add 1-L1 5\ncompute\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recalculate error"));
}

#[test]
fn split_and_delete_entries() {
    cli()
        .write_stdin("start 2024-01-01\nadd 1-L1 5\nsplit 0 3,2\ndelete 1\ndelete 9\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Split entry 0."))
        .stdout(predicate::str::contains("Deleted entry 1."))
        .stdout(predicate::str::contains("No entry at sequence order 9."));
}

#[test]
fn save_and_load_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("programme.json");
    let path = path.to_string_lossy();

    cli()
        .write_stdin(format!(
            "start 2024-03-04\nadd 2-GF 4\nsave json {path}\nquit\n"
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Programme saved to {path}.")));

    cli()
        .write_stdin(format!("load json {path}\nsettings\nquit\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Programme loaded from {path}.")))
        .stdout(predicate::str::contains("2-GF"))
        .stdout(predicate::str::contains("2024-03-04"));
}

#[test]
fn unknown_command_is_reported() {
    cli()
        .write_stdin("frobnicate\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown command. Type 'help'."));
}

#[test]
fn routine_logs_stay_quiet_by_default() {
    cli()
        .write_stdin("start 2024-01-01\nadd 1-L1 5\ncompute\nquit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("INFO").not());
}

#[test]
fn fallback_warnings_reach_stderr() {
    cli()
        .write_stdin("start 2024-01-01\nadd 1-L1 5 1\nadd 1-L2 2\ncompute\nquit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("predecessor not resolved"));
}
