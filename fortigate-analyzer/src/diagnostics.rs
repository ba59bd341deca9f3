use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::model::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Warning => "warning",
        })
    }
}

/// Non-fatal problem found while loading or resolving a configuration.
///
/// Diagnostics never stop the pipeline. A configuration that only produces
/// diagnostics still yields a usable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Diagnostic {
    UnknownDirective {
        line: usize,
        directive: String,
    },
    UnknownKey {
        line: usize,
        section: String,
        entry: String,
        key: String,
    },
    SkippedSection {
        line: usize,
        section: String,
    },
    /// Nested `config` block inside a modeled section. `entry` is empty for
    /// blocks nested directly under the section.
    SkippedBlock {
        line: usize,
        section: String,
        entry: String,
        block: String,
    },
    InvalidValue {
        line: usize,
        section: String,
        entry: String,
        key: String,
        value: String,
        reason: String,
    },
    DuplicateName {
        kind: ObjectKind,
        name: String,
        first_line: usize,
        line: usize,
    },
    UnresolvedReference {
        kind: ObjectKind,
        owner: String,
        field: String,
        name: String,
    },
    GroupCycle {
        kind: ObjectKind,
        path: Vec<String>,
    },
    ZoneConflict {
        interface: String,
        zone: String,
        claimed_by: String,
    },
}

impl Diagnostic {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Diagnostic::UnknownDirective { .. }
            | Diagnostic::UnknownKey { .. }
            | Diagnostic::SkippedSection { .. }
            | Diagnostic::SkippedBlock { .. } => DiagnosticLevel::Info,
            Diagnostic::InvalidValue { .. }
            | Diagnostic::DuplicateName { .. }
            | Diagnostic::UnresolvedReference { .. }
            | Diagnostic::GroupCycle { .. }
            | Diagnostic::ZoneConflict { .. } => DiagnosticLevel::Warning,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::UnknownDirective { .. } => "unknown_directive",
            Diagnostic::UnknownKey { .. } => "unknown_key",
            Diagnostic::SkippedSection { .. } => "skipped_section",
            Diagnostic::SkippedBlock { .. } => "skipped_block",
            Diagnostic::InvalidValue { .. } => "invalid_value",
            Diagnostic::DuplicateName { .. } => "duplicate_name",
            Diagnostic::UnresolvedReference { .. } => "unresolved_reference",
            Diagnostic::GroupCycle { .. } => "group_cycle",
            Diagnostic::ZoneConflict { .. } => "zone_conflict",
        }
    }

    /// Source line, when the diagnostic is tied to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Diagnostic::UnknownDirective { line, .. }
            | Diagnostic::UnknownKey { line, .. }
            | Diagnostic::SkippedSection { line, .. }
            | Diagnostic::SkippedBlock { line, .. }
            | Diagnostic::InvalidValue { line, .. }
            | Diagnostic::DuplicateName { line, .. } => Some(*line),
            Diagnostic::UnresolvedReference { .. }
            | Diagnostic::GroupCycle { .. }
            | Diagnostic::ZoneConflict { .. } => None,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownDirective { line, directive } => {
                write!(f, "line {line}: unknown directive `{directive}`")
            }
            Diagnostic::UnknownKey {
                line,
                section,
                entry,
                key,
            } if entry.is_empty() => write!(f, "line {line}: unknown key `{key}` in {section}"),
            Diagnostic::UnknownKey {
                line,
                section,
                entry,
                key,
            } => write!(f, "line {line}: unknown key `{key}` in {section} [{entry}]"),
            Diagnostic::SkippedSection { line, section } => {
                write!(f, "line {line}: section `{section}` is not modeled")
            }
            Diagnostic::SkippedBlock {
                line,
                section,
                entry,
                block,
            } if entry.is_empty() => {
                write!(f, "line {line}: nested block `{block}` in {section} is not modeled")
            }
            Diagnostic::SkippedBlock {
                line,
                section,
                entry,
                block,
            } => write!(
                f,
                "line {line}: nested block `{block}` in {section} [{entry}] is not modeled"
            ),
            Diagnostic::InvalidValue {
                line,
                section,
                entry,
                key,
                value,
                reason,
            } => write!(
                f,
                "line {line}: invalid {key} `{value}` in {section} [{entry}]: {reason}"
            ),
            Diagnostic::DuplicateName {
                kind,
                name,
                first_line,
                line,
            } => write!(
                f,
                "line {line}: {kind} `{name}` redefined (first defined on line {first_line}); later definition wins"
            ),
            Diagnostic::UnresolvedReference {
                kind,
                owner,
                field,
                name,
            } => write!(f, "{kind} `{owner}` {field} references unknown `{name}`"),
            Diagnostic::GroupCycle { kind, path } => write!(
                f,
                "{kind} group cycle [{}]; groups on the cycle expand to nothing",
                path.join(", ")
            ),
            Diagnostic::ZoneConflict {
                interface,
                zone,
                claimed_by,
            } => write!(
                f,
                "interface `{interface}` listed in zone `{zone}` already belongs to zone `{claimed_by}`"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Diagnostic, DiagnosticLevel};
    use crate::model::ObjectKind;

    #[test]
    fn cycle_message_lists_full_path() {
        let diag = Diagnostic::GroupCycle {
            kind: ObjectKind::Address,
            path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(diag.level(), DiagnosticLevel::Warning);
        assert!(diag.to_string().contains("[A, B, A]"));
        assert_eq!(diag.line(), None);
    }

    #[test]
    fn forward_compatibility_notes_are_info() {
        let diag = Diagnostic::UnknownKey {
            line: 12,
            section: "system interface".to_string(),
            entry: "port1".to_string(),
            key: "dhcp-relay-service".to_string(),
        };
        assert_eq!(diag.level(), DiagnosticLevel::Info);
        assert_eq!(diag.code(), "unknown_key");
    }
}
