use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn trace() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fortigate-analyzer"));
    cmd.env("NO_COLOR", "1")
        .arg("trace")
        .arg(fixture("fixtures/fortigate-basic.conf"));
    cmd
}

#[test]
fn outbound_web_is_permitted_with_source_nat() {
    trace()
        .args(["--src", "192.168.10.20", "--dst", "198.51.100.7", "--port", "443"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trace tcp 192.168.10.20 -> 198.51.100.7:443"))
        .stdout(predicate::str::contains("1 (lan-web-out)"))
        .stdout(predicate::str::contains("snat=203.0.113.2"))
        .stdout(predicate::str::contains("disposition=permit egress=port1"));
}

#[test]
fn published_service_follows_the_vip() {
    trace()
        .args(["--src", "198.51.100.7", "--dst", "203.0.113.10", "--port", "443"])
        .args(["--ingress", "port1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 (publish-web)"))
        .stdout(predicate::str::contains("dnat=172.16.20.10"))
        .stdout(predicate::str::contains("disposition=permit egress=port3"));
}

#[test]
fn unmatched_traffic_hits_the_implicit_deny() {
    trace()
        .args(["--src", "192.168.10.20", "--dst", "10.0.1.5", "--port", "22"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no matching policy"))
        .stdout(predicate::str::contains("disposition=deny-implicit"));
}

#[test]
fn json_trace_has_steps_and_disposition() {
    let output = trace()
        .args(["--src", "192.168.10.20", "--dst", "10.50.1.1"])
        .args(["--protocol", "udp", "--port", "53", "--format", "json"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let trace: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(trace["disposition"], "no-route");
    assert_eq!(trace["steps"][0]["kind"], "ingress");
}

#[test]
fn bad_protocol_is_a_usage_error() {
    trace()
        .args(["--src", "10.0.0.1", "--dst", "10.0.0.2", "--protocol", "gre"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown protocol `gre`"));
}
