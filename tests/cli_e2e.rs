//! End-to-end checks of the `playlist-dl` binary surface.

use assert_cmd::Command;
use predicates::prelude::*;

fn playlist_dl() -> Command {
    Command::cargo_bin("playlist-dl").expect("binary should build")
}

#[test]
fn test_help_describes_usage() {
    playlist_dl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--manifest"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_version_prints_crate_version() {
    playlist_dl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_output_flag_is_usage_error() {
    playlist_dl()
        .arg("http://example.com/a.mp4")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_invalid_url_exits_nonzero_with_transport_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    playlist_dl()
        .args(["not a url", "-o"])
        .arg(dir.path().join("out.bin"))
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}

#[test]
fn test_invalid_url_with_json_emits_failed_event() {
    let dir = tempfile::tempdir().expect("temp dir");
    playlist_dl()
        .args(["not a url", "-o"])
        .arg(dir.path().join("out.bin"))
        .arg("--json")
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""event":"started""#).not())
        .stdout(predicate::str::contains(r#""code":"transport_error""#));
}
