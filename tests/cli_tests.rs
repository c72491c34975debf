use assert_cmd::Command;
use predicates::prelude::*;

fn devcluster() -> Command {
    let mut cmd = Command::cargo_bin("devcluster").unwrap();
    cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_resources() {
    devcluster()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster"))
        .stdout(predicate::str::contains("registry"));
}

#[test]
fn version_flag_prints_package_version() {
    devcluster()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_product_is_a_usage_error() {
    devcluster()
        .args(["cluster", "apply", "--product", "microk9s"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown product"));
}

#[test]
fn missing_explicit_config_fails_before_any_work() {
    let dir = tempfile::tempdir().unwrap();

    devcluster()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["registry", "get"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}

#[test]
fn invalid_config_is_reported_as_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devcluster.toml");
    std::fs::write(&path, "[timing]\npoll_interval_ms = 0\n").unwrap();

    devcluster()
        .arg("--json")
        .arg("--config")
        .arg(&path)
        .args(["cluster", "get"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("poll_interval_ms"));
}
