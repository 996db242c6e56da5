mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::{docx_with_paragraphs, test_config, SKY_TEXT};

/// Nothing listens on port 1, so the backend is always unreachable.
const DEAD_BACKEND: &str = "http://127.0.0.1:1/api/generate";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docqa.toml");
    fs::write(&config_path, test_config(DEAD_BACKEND)).unwrap();

    fs::write(tmp.path().join("sky.txt"), SKY_TEXT).unwrap();
    fs::write(tmp.path().join("people.csv"), "name,role\nAda,engineer\n").unwrap();
    fs::write(
        tmp.path().join("memo.docx"),
        docx_with_paragraphs(&["Deadline is Friday.", "Budget is fixed."]),
    )
    .unwrap();
    fs::write(tmp.path().join("setup.exe"), b"MZ\x90\x00").unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_docqa"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run docqa binary");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_extract_docx() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("memo.docx");
    let (stdout, stderr, ok) = run_docqa(&config, &["extract", path.to_str().unwrap()]);
    assert!(ok, "extract failed: {}", stderr);
    assert_eq!(stdout.trim(), "Deadline is Friday.\nBudget is fixed.");
}

#[test]
fn test_extract_csv() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("people.csv");
    let (stdout, stderr, ok) = run_docqa(&config, &["extract", path.to_str().unwrap()]);
    assert!(ok, "extract failed: {}", stderr);
    assert_eq!(stdout.trim(), "name | role\nname: Ada | role: engineer");
}

#[test]
fn test_extract_unsupported_fails() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("setup.exe");
    let (_, stderr, ok) = run_docqa(&config, &["extract", path.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("unsupported attachment category"), "stderr: {}", stderr);
}

#[test]
fn test_retrieve_ranks_sky_passages() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("sky.txt");
    let (stdout, stderr, ok) = run_docqa(
        &config,
        &["retrieve", "What color is the sky?", "--file", path.to_str().unwrap(), "--k", "2"],
    );
    assert!(ok, "retrieve failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("2 of 3 passages"), "stdout: {}", stdout);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("1. [#0 "));
    assert!(lines[1].ends_with("The sky is blue."));
    assert!(lines[2].contains("sky"));
}

#[test]
fn test_ask_unsupported_file_never_calls_backend() {
    let (tmp, config) = setup_test_env();
    let path = tmp.path().join("setup.exe");
    let (stdout, _, ok) = run_docqa(&config, &["ask", "Install it", "--file", path.to_str().unwrap()]);
    assert!(!ok);
    // A backend call would have produced the communication failure instead.
    assert_eq!(stdout.trim(), "Unsupported file type: setup.exe");
}

#[test]
fn test_ask_backend_down_prints_failure_message() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_docqa(&config, &["ask", "Hello?"]);
    assert!(!ok);
    assert_eq!(
        stdout.trim(),
        "Failed to communicate with the language model. Please try again later."
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[retrieval]\ntop_k = 0\n").unwrap();
    let (_, stderr, ok) = run_docqa(&config, &["ask", "Hello?"]);
    assert!(!ok);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}
