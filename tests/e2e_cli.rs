//! CLI end-to-end tests
//!
//! Tests for the reelforge command-line interface. None of them need
//! ffmpeg or the frame tools to be installed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

const JOB_ID: &str = "6f1c2a8e-3b4d-4c5e-9f60-718293a4b5c6";

/// Get a command for the reelforge binary
#[allow(deprecated)]
fn reelforge_cmd() -> Command {
    Command::cargo_bin("reelforge").unwrap()
}

/// A scratch directory with a config that keeps all job files inside it and
/// points the tool lookup at an empty directory.
fn sandbox() -> TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(
        root.join("config.toml"),
        format!(
            r#"
[work]
root_dir = '{}'
output_dir = '{}'

[tools]
bundled_dir = '{}'
"#,
            root.join("work").display(),
            root.join("out").display(),
            root.join("bin").display(),
        ),
    )
    .unwrap();
    temp
}

fn write_request(dir: &Path, json: &str) -> std::path::PathBuf {
    let path = dir.join("request.json");
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = reelforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = reelforge_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelforge"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = reelforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("reelforge "));
}

#[test]
fn test_cli_run_help() {
    let mut cmd = reelforge_cmd();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Process a video"));
}

#[test]
fn test_cli_subtitles_renders_sorted_srt() {
    let temp = tempdir().unwrap();
    let segments = temp.path().join("segments.json");
    fs::write(
        &segments,
        r#"[
            {"text": "World", "start": 2.5, "end": 4.0},
            {"text": "Hello", "start": 0.0, "end": 2.0}
        ]"#,
    )
    .unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("subtitles")
        .arg(&segments)
        .assert()
        .success()
        .stdout(predicate::eq(
            "1\n00:00:00,000 --> 00:00:02,000\nHello\n\n\
             2\n00:00:02,500 --> 00:00:04,000\nWorld\n\n",
        ));
}

#[test]
fn test_cli_subtitles_rejects_inverted_segment() {
    let temp = tempdir().unwrap();
    let segments = temp.path().join("segments.json");
    fs::write(&segments, r#"[{"text": "Backwards", "start": 3.0, "end": 1.0}]"#).unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("subtitles")
        .arg(&segments)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must start before it ends"));
}

#[test]
fn test_cli_validate_config_file() {
    let temp = sandbox();

    let mut cmd = reelforge_cmd();
    cmd.arg("validate")
        .arg(temp.path().join("config.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_cli_validate_reports_warnings() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        "[finalize]\nvoiceover_volume = 1.0\nmusic_volume = 2.0\n",
    )
    .unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("validate")
        .arg(&config_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning"))
        .stdout(predicate::str::contains("music_volume"));
}

#[test]
fn test_cli_validate_invalid_toml() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[work\nroot_dir = ").unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("validate")
        .arg(&config_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_cli_run_nonexistent_request() {
    let temp = sandbox();

    let mut cmd = reelforge_cmd();
    cmd.arg("--config")
        .arg(temp.path().join("config.toml"))
        .args(["run", "/nonexistent/path/request.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_run_rejects_request_without_input() {
    let temp = sandbox();
    let request = write_request(temp.path(), r#"{"input_video": "", "stabilize": true}"#);

    let mut cmd = reelforge_cmd();
    cmd.arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("run")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("input_video is required"));
}

#[test]
fn test_cli_run_dry_run_lists_stages_in_order() {
    let temp = sandbox();
    // Listed out of order on purpose; stages always run in the fixed order.
    let request = write_request(
        temp.path(),
        r#"{"music": "song.mp3", "upscale": true, "stabilize": true, "input_video": "in.mp4"}"#,
    );

    let mut cmd = reelforge_cmd();
    cmd.arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("run")
        .arg(&request)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stages to execute: 3"))
        .stdout(predicate::str::contains(
            "  1. stabilize\n  2. upscale\n  3. finalize\n",
        ));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_cli_run_passthrough_delivers_copy() {
    let temp = sandbox();
    let input = temp.path().join("clip.mp4");
    fs::write(&input, b"not really a video").unwrap();
    let request = write_request(
        temp.path(),
        &format!(r#"{{"input_video": "{}"}}"#, input.display()),
    );

    let mut cmd = reelforge_cmd();
    let assert = cmd
        .arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("run")
        .arg(&request)
        .args(["--job-id", JOB_ID, "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["job_id"], JOB_ID);
    assert_eq!(summary["stages"], serde_json::json!([]));

    let delivered = temp.path().join("out").join(format!("{JOB_ID}.mp4"));
    assert_eq!(summary["output"], delivered.display().to_string());
    assert_eq!(fs::read(&delivered).unwrap(), b"not really a video");
    // Caller's input is untouched.
    assert!(input.exists());
    // The job directory is gone.
    let leftover: Vec<_> = fs::read_dir(temp.path().join("work")).unwrap().collect();
    assert!(leftover.is_empty());
}

#[test]
fn test_cli_run_missing_tool_fails_before_work() {
    let temp = sandbox();
    let input = temp.path().join("clip.mp4");
    fs::write(&input, b"frames").unwrap();
    let request = write_request(
        temp.path(),
        &format!(
            r#"{{"input_video": "{}", "stabilize": true}}"#,
            input.display()
        ),
    );

    let mut cmd = reelforge_cmd();
    cmd.env("PATH", "")
        .arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("run")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stabilization failed"))
        .stderr(predicate::str::contains("Tool not found: ffmpeg"));

    let delivered = fs::read_dir(temp.path().join("out"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(delivered, 0);
}

#[test]
fn test_cli_run_rejects_bad_job_id() {
    let temp = sandbox();
    let request = write_request(temp.path(), r#"{"input_video": "in.mp4"}"#);

    let mut cmd = reelforge_cmd();
    cmd.arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("run")
        .arg(&request)
        .args(["--job-id", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid job id"));
}
