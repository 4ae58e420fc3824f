//! Tests that run the `docent` binary against temporary files.

mod common;

use common::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docent_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docent"))
}

/// A temp dir holding `config/docent.toml` (providers disabled) and
/// `files/france.pdf`.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(files_dir.join("france.pdf"), france_pdf()).unwrap();
    fs::write(files_dir.join("notes.txt"), "plain text").unwrap();

    let config_content = r#"[selection]
max_paragraphs = 10
std_threshold = 0.01

[parsing]
block_gap_factor = 0.5
"#;
    let config_path = config_dir.join("docent.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docent(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docent_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docent binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file_arg(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_parse_prints_one_line_per_paragraph() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_docent(&config_path, &["parse", &file_arg(&tmp, "france.pdf")]);
    assert!(success, "parse failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "got: {}", stdout);
    assert!(lines[0].starts_with("#0 p.1 [72.0,"));
    assert!(lines[0].ends_with(FRANCE));
    assert!(lines[2].ends_with(EIFFEL));
}

#[test]
fn test_parse_json_output() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docent(
        &config_path,
        &["parse", &file_arg(&tmp, "france.pdf"), "--json"],
    );
    assert!(success, "parse --json failed: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["name"], "france.pdf");
    let paragraphs = report["paragraphs"].as_array().unwrap();
    assert_eq!(paragraphs.len(), 3);
    assert_eq!(paragraphs[1]["index"], 1);
    assert_eq!(paragraphs[1]["text"], WATER);
    assert_eq!(paragraphs[1]["coordinates"]["page"], 0);
}

#[test]
fn test_parse_unsupported_format_fails() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_docent(&config_path, &["parse", &file_arg(&tmp, "notes.txt")]);
    assert!(!success);
    assert!(
        stderr.contains("unsupported document format"),
        "got: {}",
        stderr
    );
}

#[test]
fn test_ask_errors_when_providers_disabled() {
    let (tmp, config_path) = setup_test_env();

    let files = tmp.path().join("files").display().to_string();
    let (_, stderr, success) = run_docent(&config_path, &["ask", QUESTION, &files]);
    assert!(!success, "ask should fail with providers disabled");
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_summarize_errors_when_generation_disabled() {
    let (tmp, config_path) = setup_test_env();
    let text = tmp.path().join("summary.txt");
    fs::write(&text, FRANCE).unwrap();

    let (_, stderr, success) = run_docent(
        &config_path,
        &["summarize", "--file", &text.display().to_string()],
    );
    assert!(!success);
    assert!(stderr.contains("Generation provider is disabled"), "got: {}", stderr);
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    fs::write(tmp.path().join("france.pdf"), france_pdf()).unwrap();

    let (_, stderr, success) = run_docent(
        &missing,
        &["parse", &tmp.path().join("france.pdf").display().to_string()],
    );
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[selection]\nmax_paragraphs = 0\n").unwrap();

    let (_, stderr, success) =
        run_docent(&config_path, &["parse", &file_arg(&tmp, "france.pdf")]);
    assert!(!success);
    assert!(stderr.contains("max_paragraphs"), "got: {}", stderr);
}
