use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn diff() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fortigate-analyzer"));
    cmd.env("NO_COLOR", "1")
        .arg("diff")
        .arg(fixture("fixtures/fortigate-basic.conf"))
        .arg(fixture("fixtures/fortigate-changed.conf"));
    cmd
}

#[test]
fn diff_text_marks_changes() {
    diff()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "config system global\n  ~ hostname: FGT-EDGE-01 -> FGT-EDGE-02",
        ))
        .stdout(predicate::str::contains("config firewall address\n"))
        .stdout(predicate::str::contains("  + [backup-server]"))
        .stdout(predicate::str::contains("  - [unused-svc]"))
        .stdout(predicate::str::contains("  ! (section): entry order changed"));
}

#[test]
fn diff_section_filter_and_summary() {
    diff()
        .args(["--section", "firewall address", "--summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("modified=1 only_left=0 only_right=1"));
}

#[test]
fn diff_json_outputs_structured_entries() {
    let output = diff().args(["--format", "json"]).output().expect("run");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["summary"]["structural"], 1);
    assert!(report["entries"]
        .as_array()
        .expect("array")
        .iter()
        .any(|e| e["type"] == "Structural" && e["path"] == "firewall policy"));
}

#[test]
fn identical_files_have_no_differences() {
    Command::new(assert_cmd::cargo::cargo_bin!("fortigate-analyzer"))
        .arg("diff")
        .arg(fixture("fixtures/fortigate-basic.conf"))
        .arg(fixture("fixtures/fortigate-basic.conf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("no differences"));
}
