use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}

#[test]
fn test_help_contains_all_commands() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("records"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("cache"))
        .stdout(predicate::str::contains("providers"))
        .stdout(predicate::str::contains("context"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn test_no_args_shows_help() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_records_json_output_is_valid_json() {
    let output = cargo_bin_cmd!("vigil")
        .arg("records")
        .arg("--output")
        .arg("json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&stdout);
    assert!(
        parsed.is_ok(),
        "records --output json should produce valid JSON"
    );
    assert!(
        parsed.unwrap().is_array(),
        "records JSON output should be an array"
    );
}

#[test]
fn test_stats_json_output_shape() {
    let output = cargo_bin_cmd!("vigil")
        .arg("stats")
        .arg("--output")
        .arg("json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert!(json.get("total_repositories").is_some());
    assert!(json.get("total_scans").is_some());
}

#[test]
fn test_providers_lists_registered_adapters() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("github"))
        .stdout(predicate::str::contains("gitlab"))
        .stdout(predicate::str::contains("generic-git"));
}

#[test]
fn test_scan_unknown_url_fails_with_hint() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.arg("scan")
        .arg("not-a-repository-url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No suitable provider"));
}

#[test]
fn test_completion_bash() {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.arg("completion")
        .arg("generate")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}
