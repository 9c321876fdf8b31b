use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn init_writes_config_to_xdg_config_home() {
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    std::fs::create_dir_all(&xdg_config_home).unwrap();

    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.env("XDG_CONFIG_HOME", &xdg_config_home)
        .args([
            "init",
            "--provider",
            "openai",
            "--api-key",
            "TEST_KEY",
            "--default-model",
            "gpt-4o-mini",
            "--profile",
            "default",
        ]);
    cmd.assert().success().stdout(contains("config written:"));

    let cfg_path = xdg_config_home.join("docquiz").join("config.toml");
    let contents = std::fs::read_to_string(cfg_path).unwrap();
    assert!(contents.contains("default_profile"));
    assert!(contents.contains("profiles"));
    assert!(contents.contains("openai"));
    assert!(contents.contains("TEST_KEY"));
}

#[test]
fn init_validate_fails_fast_without_key() {
    // Non-interactive validate should fail gracefully when the key is
    // missing, not hang on a prompt.
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    std::fs::create_dir_all(&xdg_config_home).unwrap();

    let mut cmd = Command::cargo_bin("dq").unwrap();
    let assert = cmd
        .env("XDG_CONFIG_HOME", &xdg_config_home)
        .env_remove("OPENAI_API_KEY")
        .args([
            "init",
            "--provider", "openai",
            "--default-model", "gpt-4o-mini",
            "--profile", "default",
            "--validate",
        ])
        .assert();
    assert.failure();
}

#[test]
fn commands_use_provider_from_config_profile() {
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    std::fs::create_dir_all(xdg_config_home.join("docquiz")).unwrap();
    std::fs::write(
        xdg_config_home.join("docquiz").join("config.toml"),
        r#"
default_profile = "default"

[profiles.default]
provider = "mock"
model = "test-model"
"#,
    )
    .unwrap();

    let doc = temp.path().join("doc.txt");
    std::fs::write(
        &doc,
        "A single sentence that is clearly long enough to become a chunk.",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("dq").unwrap();
    cmd.env("XDG_CONFIG_HOME", &xdg_config_home)
        .args(["questions", "--file", doc.to_str().unwrap()]);
    cmd.assert().success().stdout(contains("[stub question]"));
}

#[test]
fn generation_table_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let xdg_config_home = temp.path().join(".config");
    std::fs::create_dir_all(xdg_config_home.join("docquiz")).unwrap();
    std::fs::write(
        xdg_config_home.join("docquiz").join("config.toml"),
        r#"
[generation]
question_cap = 5
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("dq").unwrap();
    let assert = cmd
        .env("XDG_CONFIG_HOME", &xdg_config_home)
        .args(["plan", "--pages", "1000", "--json"])
        .assert()
        .success();
    let out = assert.get_output();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["planned"], 5);
}
