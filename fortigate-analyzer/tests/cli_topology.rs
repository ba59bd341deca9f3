use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn topology() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fortigate-analyzer"));
    cmd.arg("topology")
        .arg(fixture("fixtures/fortigate-basic.conf"));
    cmd
}

#[test]
fn json_graph_lists_permit_and_blocked_edges() {
    let output = topology().output().expect("run");
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let edges: Vec<(&str, &str)> = graph["edges"]
        .as_array()
        .expect("edges")
        .iter()
        .map(|e| (e["from"].as_str().unwrap(), e["to"].as_str().unwrap()))
        .collect();
    assert_eq!(
        edges,
        [
            ("internal", "dmz-zone"),
            ("internal", "port1"),
            ("port1", "dmz-zone")
        ]
    );
    assert_eq!(graph["blocked"][0]["from"], "dmz-zone");
    assert_eq!(graph["blocked"][0]["to"], "internal");
}

#[test]
fn dot_output_uses_clusters_and_can_drop_blocked_edges() {
    topology()
        .args(["--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph topology {"))
        .stdout(predicate::str::contains("subgraph \"cluster_internal\""))
        .stdout(predicate::str::contains("style=dashed"));

    topology()
        .args(["--format", "dot", "--no-blocked"])
        .assert()
        .success()
        .stdout(predicate::str::contains("style=dashed").not());
}

#[test]
fn graphml_is_written_to_output_file() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("topology.graphml");

    topology()
        .args(["--format", "graphml", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out).expect("read");
    assert!(written.contains("<graphml"));
    assert!(written.contains("dmz-zone"));
}

#[test]
fn output_refuses_to_overwrite_the_input() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("fw.conf");
    fs::copy(fixture("fixtures/fortigate-basic.conf"), &input).expect("copy");

    Command::new(assert_cmd::cargo::cargo_bin!("fortigate-analyzer"))
        .arg("topology")
        .arg(&input)
        .arg("--output")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn tree_format_shows_zones_and_unzoned_interfaces() {
    topology()
        .args(["--format", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zone dmz-zone intrazone=allow"))
        .stdout(predicate::str::contains("unzoned"));
}
