use std::collections::BTreeMap;
use std::thread;

use colored::Colorize;
use forticonf_core::{DiffEntry, DiffSummary};
use serde::Serialize;
use tracing::debug;

use crate::audit::{render_audit_text, run_audit, AuditConfig, AuditReport};
use crate::connectivity::{build_connectivity_tree, render_connectivity_tree, ConnectivityTree};
use crate::diagnostics::{Diagnostic, DiagnosticLevel};
use crate::load::LoadedConfig;
use crate::model::{ObjectKind, ObjectModel};
use crate::topology::{build_topology, GraphDescription};

/// Diff entries plus their counts, as emitted by `diff --format json`.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub summary: DiffSummary,
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn new(entries: Vec<DiffEntry>) -> Self {
        Self {
            summary: DiffSummary::of(&entries),
            entries,
        }
    }
}

/// Diff entries grouped under a `config <section>` header per top-level
/// section, in first-seen order.
pub fn render_diff_text(entries: &[DiffEntry]) -> String {
    let mut sections: Vec<(&str, Vec<&DiffEntry>)> = Vec::new();
    for entry in entries {
        match sections.iter_mut().find(|(name, _)| *name == entry.section()) {
            Some((_, group)) => group.push(entry),
            None => sections.push((entry.section(), vec![entry])),
        }
    }

    let mut out = Vec::new();
    for (section, group) in sections {
        out.push(format!("config {section}").bold().to_string());
        for entry in group {
            out.push(format!("  {}", diff_line(entry)));
        }
    }
    out.join("\n")
}

fn diff_line(entry: &DiffEntry) -> String {
    let target = match entry.subpath() {
        "" => "(section)",
        sub => sub,
    };
    match entry {
        DiffEntry::Identical { .. } => format!("= {target}").dimmed().to_string(),
        DiffEntry::Modified { left, right, .. } => {
            format!("~ {target}: {left} -> {right}").yellow().to_string()
        }
        DiffEntry::OnlyLeft { .. } => format!("- {target}").red().to_string(),
        DiffEntry::OnlyRight { .. } => format!("+ {target}").green().to_string(),
        DiffEntry::Structural { description, .. } => {
            format!("! {target}: {description}").magenta().to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub vdom: Option<String>,
    pub objects: BTreeMap<ObjectKind, usize>,
    pub policies_enabled: usize,
    pub policies_disabled: usize,
    pub diagnostics_warning: usize,
    pub diagnostics_info: usize,
}

/// Object counts per kind plus policy status and diagnostic totals.
pub fn build_summary(model: &ObjectModel, diagnostics: &[Diagnostic]) -> SummaryCounts {
    let enabled = model.policies().iter().filter(|p| p.enabled).count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level() == DiagnosticLevel::Warning)
        .count();
    SummaryCounts {
        hostname: model.hostname().map(str::to_string),
        version: model.version().map(str::to_string),
        vdom: model.vdom().map(str::to_string),
        objects: ObjectKind::ALL
            .iter()
            .map(|&kind| (kind, model.count(kind)))
            .collect(),
        policies_enabled: enabled,
        policies_disabled: model.policies().len() - enabled,
        diagnostics_warning: warnings,
        diagnostics_info: diagnostics.len() - warnings,
    }
}

/// Names flagged by `unused_object`, grouped by kind in finding order.
pub fn unused_objects(audit: &AuditReport) -> BTreeMap<ObjectKind, Vec<String>> {
    let mut out: BTreeMap<ObjectKind, Vec<String>> = BTreeMap::new();
    for finding in audit.by_rule("unused_object") {
        out.entry(finding.entity.kind)
            .or_default()
            .push(finding.entity.name.clone());
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub summary: SummaryCounts,
    pub unused_objects: BTreeMap<ObjectKind, Vec<String>>,
    pub topology: GraphDescription,
    pub connectivity: ConnectivityTree,
    pub audit: AuditReport,
}

/// Every derived view of one loaded configuration.
///
/// Topology and audit only read the model, so they are built on scoped
/// threads side by side.
pub fn build_full_report(loaded: &LoadedConfig, config: &AuditConfig) -> FullReport {
    let model = &loaded.model;
    let ((topology, connectivity), audit) = thread::scope(|scope| {
        let views = scope.spawn(|| (build_topology(model), build_connectivity_tree(model)));
        let audit = run_audit(model, config);
        let views = views
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (views, audit)
    });
    debug!(
        edges = topology.edges.len(),
        findings = audit.findings.len(),
        "report views built"
    );

    FullReport {
        summary: build_summary(model, &loaded.diagnostics),
        unused_objects: unused_objects(&audit),
        topology,
        connectivity,
        audit,
    }
}

pub fn render_full_report_text(report: &FullReport) -> String {
    let summary = &report.summary;
    let mut out = Vec::new();
    out.push(format!(
        "report hostname={} version={} vdom={}",
        summary.hostname.as_deref().unwrap_or("-"),
        summary.version.as_deref().unwrap_or("-"),
        summary.vdom.as_deref().unwrap_or("-"),
    ));
    out.push("summary".to_string());
    for (kind, count) in &summary.objects {
        out.push(format!("- {kind}: {count}"));
    }
    out.push(format!(
        "- policies enabled={} disabled={}",
        summary.policies_enabled, summary.policies_disabled
    ));
    out.push(format!(
        "- diagnostics warning={} info={}",
        summary.diagnostics_warning, summary.diagnostics_info
    ));

    out.push(String::new());
    out.push("unused_objects".to_string());
    if report.unused_objects.is_empty() {
        out.push("- none".to_string());
    }
    for (kind, names) in &report.unused_objects {
        out.push(format!("- {kind}: {}", names.join(", ")));
    }

    out.push(String::new());
    out.push(format!(
        "topology nodes={} edges={} blocked={}",
        report.topology.nodes.len(),
        report.topology.edges.len(),
        report.topology.blocked.len()
    ));

    out.push(String::new());
    out.push("connectivity".to_string());
    out.push(render_connectivity_tree(&report.connectivity));

    out.push(String::new());
    out.push(render_audit_text(&report.audit, None));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use forticonf_core::DiffEntry;

    use super::{
        build_full_report, build_summary, render_diff_text, render_full_report_text,
        unused_objects, DiffReport,
    };
    use crate::audit::{run_audit, AuditConfig};
    use crate::load::{load_config, LoadOptions, LoadedConfig};
    use crate::model::ObjectKind;

    fn basic() -> LoadedConfig {
        let text = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../fixtures/fortigate-basic.conf"
        ));
        load_config(text, &LoadOptions::default()).expect("load")
    }

    #[test]
    fn summary_counts_each_kind() {
        let loaded = basic();
        let summary = build_summary(&loaded.model, &loaded.diagnostics);
        assert_eq!(summary.hostname.as_deref(), Some("FGT-EDGE-01"));
        assert_eq!(summary.version.as_deref(), Some("7.2.5"));
        assert_eq!(summary.objects[&ObjectKind::Interface], 7);
        assert_eq!(summary.objects[&ObjectKind::Zone], 2);
        assert_eq!(summary.objects[&ObjectKind::Policy], 8);
        assert_eq!(summary.objects[&ObjectKind::Route], 6);
        assert_eq!(summary.objects[&ObjectKind::CentralSnat], 0);
        assert_eq!(summary.policies_enabled, 7);
        assert_eq!(summary.policies_disabled, 1);
        assert_eq!(
            summary.diagnostics_warning + summary.diagnostics_info,
            loaded.diagnostics.len()
        );
    }

    #[test]
    fn unused_objects_project_audit_findings() {
        let loaded = basic();
        let audit = run_audit(&loaded.model, &AuditConfig::default());
        let unused = unused_objects(&audit);
        assert_eq!(unused[&ObjectKind::Address], ["public-dns", "unused-host"]);
        assert_eq!(unused[&ObjectKind::Service], ["PING", "unused-svc"]);
        assert!(!unused.contains_key(&ObjectKind::Vip));
    }

    #[test]
    fn diff_text_groups_entries_by_section() {
        let entries = vec![
            DiffEntry::Modified {
                path: "firewall policy[1].action".to_string(),
                left: "accept".to_string(),
                right: "deny".to_string(),
            },
            DiffEntry::OnlyRight {
                path: "firewall address[new]".to_string(),
                value: String::new(),
            },
            DiffEntry::Structural {
                path: "firewall policy".to_string(),
                description: "entry order changed: left=[1,2] right=[2,1]".to_string(),
            },
        ];

        colored::control::set_override(false);
        assert_eq!(
            render_diff_text(&entries),
            "config firewall policy\n  ~ [1].action: accept -> deny\n  ! (section): entry order changed: left=[1,2] right=[2,1]\nconfig firewall address\n  + [new]"
        );
        let report = DiffReport::new(entries);
        assert_eq!(report.summary.changes(), 3);
        assert_eq!(report.summary.only_right, 1);
    }

    #[test]
    fn full_report_matches_individual_views() {
        let loaded = basic();
        let report = build_full_report(&loaded, &AuditConfig::default());
        assert_eq!(
            report.audit,
            run_audit(&loaded.model, &AuditConfig::default())
        );
        assert_eq!(report.topology, crate::topology::build_topology(&loaded.model));

        colored::control::set_override(false);
        let text = render_full_report_text(&report);
        assert!(text.starts_with("report hostname=FGT-EDGE-01 version=7.2.5 vdom=-\nsummary\n"));
        assert!(text.contains("- address: public-dns, unused-host"));
        assert!(text.contains("\nconnectivity\nzone "));
        assert!(text.contains("result critical=1"));
    }
}
