use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;

#[test]
fn prints_help() {
    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("Document chunking and question generation"));
}

#[test]
fn chunks_requires_file() {
    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.arg("chunks");
    // clap should error about the missing argument
    cmd.assert().failure().stderr(contains("Usage:"));
}

#[test]
fn questions_stub_works() {
    let temp = tempfile::tempdir().unwrap();
    let doc = temp.path().join("doc.txt");
    fs::write(
        &doc,
        "The first sentence is comfortably long enough to survive. \
         The second sentence also clears the minimum with room to spare.",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join(".config"))
        .args(["questions", "--file", doc.to_str().unwrap(), "--provider", "mock"]);
    cmd.assert().success().stdout(contains("[stub question]"));
}
