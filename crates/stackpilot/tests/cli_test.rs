use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

/// CLIヘルプに両フラグが載っていることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--init-config"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackpilot"));
}

/// --init-config はサンプル設定を書き出して終了する
#[test]
fn test_init_config_writes_example() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");

    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--init-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration file created"));

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("instances:"));
    assert!(written.contains("accessToken"));
}

/// 既存ファイルがある場合は上書きを拒否する
#[test]
fn test_init_config_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(&path, "instances: []\n").unwrap();

    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--init-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    // 中身は元のまま
    assert_eq!(fs::read_to_string(&path).unwrap(), "instances: []\n");
}

/// 設定ファイルが無ければ設定エラーで終了する
#[test]
fn test_missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

/// instances が空の設定も実行前に弾かれる
#[test]
fn test_empty_instances_rejected_before_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(&path, "logging:\n  type: console\n").unwrap();

    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("instances"));
}

/// 到達できないインスタンスがあっても run は完走してサマリを出す
#[test]
fn test_run_completes_with_unreachable_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(
        &path,
        "instances:\n  - name: local\n    host: http://127.0.0.1:9\n    accessToken: tok\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("unreachable"))
        .stdout(predicate::str::contains("Run summary"));
}
