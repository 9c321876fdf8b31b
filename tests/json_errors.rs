use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

fn json_error_code(assert: &assert_cmd::assert::Assert) -> String {
    let out = assert.get_output();
    assert_eq!(out.status.success(), false);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&stdout).expect("valid json error");
    assert!(v.get("message").is_some());
    v["code"].as_str().expect("code field").to_string()
}

fn dq(temp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join(".config"));
    cmd
}

#[test]
fn chunks_missing_file_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let assert = dq(&temp)
        .args(["chunks", "--file", "missing.txt", "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "file_not_found");
}

#[test]
fn chunks_unsupported_extension_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("doc.docx");
    fs::write(&file, "not really a docx").unwrap();
    let assert = dq(&temp)
        .args(["chunks", "--file", file.to_str().unwrap(), "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "unsupported_extension");
}

#[test]
fn plan_without_input_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let assert = dq(&temp).args(["plan", "--json"]).assert();
    assert_eq!(json_error_code(&assert), "invalid_args");
}

#[test]
fn plan_with_both_inputs_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("doc.txt");
    fs::write(&file, "text").unwrap();
    let assert = dq(&temp)
        .args(["plan", "--pages", "3", "--file", file.to_str().unwrap(), "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "invalid_args");
}

#[test]
fn qna_missing_dir_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let assert = dq(&temp)
        .args(["qna", "--dir", "no-such-dir", "--provider", "mock", "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "dir_not_found");
}

#[test]
fn qna_empty_dir_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let empty = temp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let assert = dq(&temp)
        .args(["qna", "--dir", empty.to_str().unwrap(), "--provider", "mock", "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "missing_input");
}

#[test]
fn sheets_without_input_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let assert = dq(&temp)
        .args(["sheets", "--provider", "mock", "--json"])
        .assert();
    assert_eq!(json_error_code(&assert), "invalid_args");
}

#[test]
fn questions_missing_images_dir_json_error() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("doc.txt");
    fs::write(&file, "A sentence that is long enough to matter here.").unwrap();
    let assert = dq(&temp)
        .args([
            "questions",
            "--file", file.to_str().unwrap(),
            "--images-dir", "no-such-dir",
            "--provider", "mock",
            "--json",
        ])
        .assert();
    assert_eq!(json_error_code(&assert), "dir_not_found");
}
