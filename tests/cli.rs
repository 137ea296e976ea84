//! Tests that drive the `harvest` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn harvest_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_harvest"))
}

fn write_config(root: &Path, body: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("harvest.toml");
    fs::write(&path, body).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(harvest_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("GITHUB_ACCESS_TOKEN")
        .env_remove("KNOWLEDGE_STORAGE")
        .env_remove("KNOWLEDGE_PATH")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run harvest")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn local_config(root: &Path) -> String {
    format!(
        r#"
[storage]
backend = "local"
root = "{}"

[[repositories]]
organization = "thoth-station"
name = "amun-api"

[[repositories]]
organization = "aicoe"
name = "log-anomaly-detector"
"#,
        root.join("knowledge").display()
    )
}

#[test]
fn repos_lists_configured_repositories() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &local_config(tmp.path()));

    let output = run(&config, &["repos"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("storage: local"));
    assert!(out.contains("thoth-station/amun-api"));
    assert!(out.contains("aicoe/log-anomaly-detector/PullRequest.json"));
}

#[test]
fn sync_without_repositories_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "[storage]\nbackend = \"local\"\n");

    let output = run(&config, &["sync"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("no repositories configured"));
    assert!(stdout(&output).trim_end().ends_with("ok"));
}

#[test]
fn sync_without_token_fails_before_any_pass() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &local_config(tmp.path()));

    let output = run(&config, &["sync", "--progress", "off"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("GITHUB_ACCESS_TOKEN"));
    assert!(!tmp.path().join("knowledge").exists());
}

#[test]
fn show_summarizes_stored_knowledge() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &local_config(tmp.path()));

    let dir = tmp.path().join("knowledge/thoth-station/amun-api");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("PullRequest.json"),
        concat!(
            r#"{"approved_at":null,"approved_by":null,"author":"a","commit_count":1,"created_at":100,"id":1,"labels":[],"time_to_review":null}"#,
            "\n",
            r#"{"approved_at":7300,"approved_by":"b","author":"a","commit_count":2,"created_at":100,"id":4,"labels":["bug"],"time_to_review":7200}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = run(&config, &["show", "thoth-station/amun-api"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("records: 2"));
    assert!(out.contains("ids: 1 .. 4"));
    assert!(out.contains("approved: 1"));
    assert!(out.contains("mean time to review: 2h 0m"));
}

#[test]
fn show_of_unknown_repository_is_empty() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &local_config(tmp.path()));

    let output = run(&config, &["show", "nobody/nothing"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("records: 0"));
    assert!(stdout(&output).contains("mean time to review: n/a"));
}

#[test]
fn storage_path_can_be_overridden_from_environment() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "");
    let elsewhere = tmp.path().join("elsewhere");

    let output = Command::new(harvest_binary())
        .arg("--config")
        .arg(&config)
        .arg("repos")
        .env_remove("KNOWLEDGE_STORAGE")
        .env("KNOWLEDGE_PATH", &elsewhere)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains(&elsewhere.display().to_string()));
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "[github]\nper_page = 500\n");

    let output = run(&config, &["repos"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("per_page"));
}

#[test]
fn missing_config_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("nope.toml"), &["repos"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read config file"));
}
