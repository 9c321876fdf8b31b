use assert_cmd::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

fn dq(temp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join(".config"));
    cmd
}

fn run_qna(temp: &tempfile::TempDir, docs: &Path, out: &Path, force: bool) -> serde_json::Value {
    let mut cmd = dq(temp);
    cmd.args([
        "qna",
        "--dir", docs.to_str().unwrap(),
        "--output-dir", out.to_str().unwrap(),
        "--provider", "mock",
        "--json",
    ]);
    if force {
        cmd.arg("--force");
    }
    let assert = cmd.assert().success();
    serde_json::from_slice(&assert.get_output().stdout).unwrap()
}

#[test]
fn writes_qna_files_and_skips_unchanged_sources() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("report.txt"),
        "The quarterly report covers revenue growth in enough detail. \
         It also discusses the hiring plan for the coming year.",
    )
    .unwrap();
    let out = temp.path().join("out");

    let v = run_qna(&temp, &docs, &out, false);
    assert_eq!(v["processed"], 1);
    assert_eq!(v["skipped"], 0);
    assert_eq!(v["failed"], 0);
    let outputs = v["outputs"].as_array().unwrap();
    assert_eq!(outputs.len(), 1);
    let qna_path = outputs[0].as_str().unwrap();
    assert!(qna_path.ends_with("report_QnA.txt"));

    let content = fs::read_to_string(qna_path).unwrap();
    assert!(content.starts_with("Questions & Answers for report.txt"));
    assert!(content.contains("Q1:"));
    assert!(content.contains("A1: [stub answer]"));

    // Digest recorded alongside the output
    assert!(out.join("report_QnA.md5").exists());

    // Second run skips the unchanged source
    let v = run_qna(&temp, &docs, &out, false);
    assert_eq!(v["processed"], 0);
    assert_eq!(v["skipped"], 1);

    // --force regenerates
    let v = run_qna(&temp, &docs, &out, true);
    assert_eq!(v["processed"], 1);
    assert_eq!(v["skipped"], 0);
}

#[test]
fn changed_source_is_reprocessed() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    let doc = docs.join("notes.txt");
    fs::write(
        &doc,
        "The original content has one sentence long enough to chunk.",
    )
    .unwrap();
    let out = temp.path().join("out");

    let v = run_qna(&temp, &docs, &out, false);
    assert_eq!(v["processed"], 1);

    fs::write(
        &doc,
        "The revised content replaces the original sentence entirely now.",
    )
    .unwrap();
    let v = run_qna(&temp, &docs, &out, false);
    assert_eq!(v["processed"], 1);
    assert_eq!(v["skipped"], 0);
}

#[test]
fn console_mode_prints_a_summary_block() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("a.txt"),
        "One document with one qualifying sentence of full length.",
    )
    .unwrap();
    let out = temp.path().join("out");

    let mut cmd = dq(&temp);
    cmd.args([
        "qna",
        "--dir", docs.to_str().unwrap(),
        "--output-dir", out.to_str().unwrap(),
        "--provider", "mock",
    ]);
    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("DOCUMENT PROCESSING SUMMARY"));
    assert!(stdout.contains("Processed: 1"));
}
