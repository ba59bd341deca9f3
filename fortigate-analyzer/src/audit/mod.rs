//! Audit engine.
//!
//! Each check is an [`AuditRule`]. Rules only read the resolved model and
//! never see each other's output, so [`run_audit`] evaluates them on scoped
//! threads and merges the findings afterwards.
//!
//! Built-in rules are listed in [`builtin_rules`]. Other crates can add rules
//! without touching this one:
//!
//! ```ignore
//! struct NoComments;
//! impl AuditRule for NoComments { /* ... */ }
//! inventory::submit! { RuleRegistration { rule: &NoComments } }
//! ```

pub mod config;
pub mod rules;

use std::cmp::Reverse;
use std::fmt::{self, Display, Formatter};
use std::thread;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ObjectKind, ObjectModel};

pub use config::{load_audit_config, AuditConfig, AuditConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub kind: ObjectKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: String,
    pub entity: EntityRef,
    pub message: String,
}

impl Finding {
    /// A finding at the rule's default severity.
    pub fn new(
        rule: &dyn AuditRule,
        kind: ObjectKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: rule.default_severity(),
            rule: rule.id().to_string(),
            entity: EntityRef {
                kind,
                name: name.into(),
            },
            message: message.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// One independent check over the object model.
pub trait AuditRule: Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn default_severity(&self) -> Severity;
    fn evaluate(&self, model: &ObjectModel, config: &AuditConfig) -> Vec<Finding>;
}

/// Registration record for rules contributed through `inventory`.
pub struct RuleRegistration {
    pub rule: &'static dyn AuditRule,
}

inventory::collect!(RuleRegistration);

pub fn builtin_rules() -> Vec<&'static dyn AuditRule> {
    vec![
        &rules::OverlyPermissive,
        &rules::LoggingDisabled,
        &rules::UnusedObject,
        &rules::UnresolvedReference,
        &rules::ShadowedPolicy,
        &rules::AnyInterface,
        &rules::DisabledPolicy,
        &rules::EmptyGroup,
        &rules::GroupCycle,
        &rules::DeepGroupNesting,
    ]
}

/// Built-in plus registered rules, one per id, sorted by id. Built-ins win id clashes.
pub fn registered_rules() -> Vec<&'static dyn AuditRule> {
    let mut all = builtin_rules();
    for registration in inventory::iter::<RuleRegistration> {
        if all.iter().all(|r| r.id() != registration.rule.id()) {
            all.push(registration.rule);
        }
    }
    all.sort_by_key(|r| r.id());
    all
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub rules: Vec<String>,
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.rule == rule)
    }

    /// Drop findings below `min` and recount.
    pub fn retain_min_severity(&mut self, min: Severity) {
        self.findings.retain(|f| f.severity >= min);
        self.counts = SeverityCounts::tally(&self.findings);
    }
}

/// Run every enabled rule concurrently and merge the findings.
///
/// Findings are ordered by severity (critical first), then entity name, rule
/// id and message.
pub fn run_audit(model: &ObjectModel, config: &AuditConfig) -> AuditReport {
    let rules: Vec<&'static dyn AuditRule> = registered_rules()
        .into_iter()
        .filter(|r| !config.disabled.iter().any(|d| d == r.id()))
        .collect();

    let mut findings: Vec<Finding> = thread::scope(|scope| {
        let handles: Vec<_> = rules
            .iter()
            .map(|&rule| {
                scope.spawn(move || {
                    let mut findings = rule.evaluate(model, config);
                    if let Some(&severity) = config.severity.get(rule.id()) {
                        for finding in &mut findings {
                            finding.severity = severity;
                        }
                    }
                    debug!(rule = rule.id(), findings = findings.len(), "rule evaluated");
                    findings
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    findings.sort_by(|a, b| {
        (Reverse(a.severity), &a.entity.name, &a.rule, &a.message).cmp(&(
            Reverse(b.severity),
            &b.entity.name,
            &b.rule,
            &b.message,
        ))
    });

    AuditReport {
        rules: rules.iter().map(|r| r.id().to_string()).collect(),
        counts: SeverityCounts::tally(&findings),
        findings,
    }
}

pub fn render_audit_text(report: &AuditReport, config_source: Option<&str>) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "audit rules={} findings={}",
        report.rules.len(),
        report.findings.len()
    ));
    if let Some(source) = config_source {
        out.push(format!("Using audit config: {source}"));
    }
    out.push(format!(
        "result critical={} warning={} info={}",
        report.counts.critical, report.counts.warning, report.counts.info
    ));
    out.push("findings".to_string());
    if report.findings.is_empty() {
        out.push("- none".to_string());
        return out.join("\n");
    }
    for finding in &report.findings {
        let severity = match finding.severity {
            Severity::Critical => finding.severity.to_string().red().bold(),
            Severity::Warning => finding.severity.to_string().yellow(),
            Severity::Info => finding.severity.to_string().normal(),
        };
        out.push(format!(
            "- [{severity}] {} {} `{}`: {}",
            finding.rule, finding.entity.kind, finding.entity.name, finding.message
        ));
    }
    out.join("\n")
}
