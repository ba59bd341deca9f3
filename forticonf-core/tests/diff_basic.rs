use std::path::PathBuf;

use forticonf_core::{diff, diff_with_options, parse_file, DiffEntry, DiffOptions, DiffSummary};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn load_pair() -> (forticonf_core::ConfigTree, forticonf_core::ConfigTree) {
    let left = parse_file(&fixture("fixtures/fortigate-basic.conf")).expect("left parse");
    let right = parse_file(&fixture("fixtures/fortigate-changed.conf")).expect("right parse");
    (left, right)
}

#[test]
fn diff_detects_modifications_insertions_and_removals() {
    let (left, right) = load_pair();
    let entries = diff(&left, &right);

    assert!(entries.contains(&DiffEntry::Modified {
        path: "system global.hostname".to_string(),
        left: "FGT-EDGE-01".to_string(),
        right: "FGT-EDGE-02".to_string(),
    }));
    assert!(entries
        .iter()
        .any(|e| matches!(e, DiffEntry::OnlyRight { path, .. } if path == "firewall address[backup-server]")));
    assert!(entries
        .iter()
        .any(|e| matches!(e, DiffEntry::OnlyLeft { path, .. } if path == "firewall service custom[unused-svc]")));

    assert!(entries.iter().any(|e| matches!(
        e,
        DiffEntry::Modified { path, .. } if path == "firewall address[unused-host].subnet"
    )));
    let summary = DiffSummary::of(&entries);
    assert_eq!(summary.modified, 2);
    assert_eq!(summary.identical, 0);
    assert_eq!(summary.changes(), entries.len());
}

#[test]
fn diff_reports_policy_reordering() {
    let (left, right) = load_pair();
    let entries = diff(&left, &right);
    let structural: Vec<&DiffEntry> = entries
        .iter()
        .filter(|e| matches!(e, DiffEntry::Structural { .. }))
        .collect();
    assert_eq!(structural.len(), 1);
    assert_eq!(structural[0].path(), "firewall policy");
}

#[test]
fn ignore_paths_skips_hostname_differences() {
    let (left, right) = load_pair();
    let opts = DiffOptions {
        ignore_paths: vec!["hostname".to_string(), "firewall policy".to_string()],
        ..DiffOptions::default()
    };

    let entries = diff_with_options(&left, &right, &opts);

    assert!(!entries.iter().any(|entry| entry.path().contains("hostname")));
    assert!(!entries
        .iter()
        .any(|entry| entry.path().starts_with("firewall policy")));
}

#[test]
fn identical_inputs_only_produce_identical_rows() {
    let (left, _) = load_pair();
    let opts = DiffOptions {
        include_identical: true,
        ..DiffOptions::default()
    };
    let entries = diff_with_options(&left, &left, &opts);
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .all(|e| matches!(e, DiffEntry::Identical { .. })));
}
