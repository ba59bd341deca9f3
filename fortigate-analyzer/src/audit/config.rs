use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Severity;

const EMBEDDED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/audit/default.toml"));

#[derive(Debug, Error)]
pub enum AuditConfigError {
    #[error("failed to read audit config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid audit config {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },
}

/// Rule selection and thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Rule ids that are not evaluated.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Severity overrides by rule id.
    #[serde(default)]
    pub severity: BTreeMap<String, Severity>,
    #[serde(default = "default_max_group_depth")]
    pub max_group_depth: usize,
}

fn default_max_group_depth() -> usize {
    3
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            severity: BTreeMap::new(),
            max_group_depth: default_max_group_depth(),
        }
    }
}

pub fn parse_audit_config(raw: &str, origin: &str) -> Result<AuditConfig, AuditConfigError> {
    toml::from_str(raw).map_err(|source| AuditConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Load the rule configuration from `path`, or the embedded default.
///
/// Returns the configuration with its source: `embedded` or `file:<path>`.
pub fn load_audit_config(path: Option<&Path>) -> Result<(AuditConfig, String), AuditConfigError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| AuditConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let source = format!("file:{}", path.display());
            Ok((parse_audit_config(&raw, &source)?, source))
        }
        None => Ok((parse_audit_config(EMBEDDED, "embedded")?, "embedded".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{load_audit_config, parse_audit_config, AuditConfigError};
    use crate::audit::Severity;

    #[test]
    fn embedded_config_loads() {
        let (config, source) = load_audit_config(None).expect("embedded");
        assert_eq!(source, "embedded");
        assert_eq!(config.max_group_depth, 3);
        assert_eq!(config.severity.get("disabled_policy"), Some(&Severity::Info));
    }

    #[test]
    fn file_config_reports_its_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rules.toml");
        fs::write(
            &path,
            "disabled = [\"unused_object\"]\n[severity]\nlogging_disabled = \"critical\"\n",
        )
        .expect("write");
        let (config, source) = load_audit_config(Some(&path)).expect("file");
        assert!(source.starts_with("file:"));
        assert_eq!(config.disabled, ["unused_object"]);
        assert_eq!(config.max_group_depth, 3);
        assert_eq!(
            config.severity.get("logging_disabled"),
            Some(&Severity::Critical)
        );
    }

    #[test]
    fn unknown_fields_and_severities_are_rejected() {
        assert!(matches!(
            parse_audit_config("colour = true\n", "test"),
            Err(AuditConfigError::Parse { .. })
        ));
        assert!(parse_audit_config("[severity]\nunused_object = \"fatal\"\n", "test").is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().expect("tempdir");
        let err = load_audit_config(Some(&dir.path().join("nope.toml"))).expect_err("missing");
        assert!(matches!(err, AuditConfigError::Read { .. }));
    }
}
