use crate::audit::{AuditConfig, AuditRule, Finding, Severity};
use crate::matching::{address_coverage, service_coverage};
use crate::model::{LogTraffic, ObjectKind, ObjectModel, Policy};

fn policy_finding(rule: &dyn AuditRule, policy: &Policy, message: impl Into<String>) -> Finding {
    Finding::new(rule, ObjectKind::Policy, policy.label(), message)
}

/// Accepts any source, any destination and any service.
pub struct OverlyPermissive;

impl AuditRule for OverlyPermissive {
    fn id(&self) -> &'static str {
        "overly_permissive"
    }

    fn description(&self) -> &'static str {
        "accept policies matching any source, any destination and any service"
    }

    fn default_severity(&self) -> Severity {
        Severity::Critical
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let everything = |policy: &Policy| {
            !policy.srcaddr_negate
                && !policy.dstaddr_negate
                && !policy.service_negate
                && address_coverage(model, &policy.srcaddr).is_some_and(|c| c.any)
                && address_coverage(model, &policy.dstaddr).is_some_and(|c| c.any)
                && service_coverage(model, &policy.service).is_some_and(|c| c.any)
        };
        model
            .policies()
            .iter()
            .filter(|p| p.permits() && everything(p))
            .map(|p| {
                let finding = policy_finding(
                    self,
                    p,
                    "accepts any source to any destination on any service",
                );
                if p.enabled {
                    finding
                } else {
                    finding.with_severity(Severity::Warning)
                }
            })
            .collect()
    }
}

pub struct LoggingDisabled;

impl AuditRule for LoggingDisabled {
    fn id(&self) -> &'static str {
        "logging_disabled"
    }

    fn description(&self) -> &'static str {
        "enabled policies with traffic logging turned off"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        model
            .policies()
            .iter()
            .filter(|p| p.enabled && p.logtraffic == LogTraffic::Disable)
            .map(|p| policy_finding(self, p, "traffic logging is disabled"))
            .collect()
    }
}

pub struct AnyInterface;

impl AuditRule for AnyInterface {
    fn id(&self) -> &'static str {
        "any_interface"
    }

    fn description(&self) -> &'static str {
        "enabled policies bound to the `any` interface"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for policy in model.policies().iter().filter(|p| p.enabled) {
            for (field, refs) in [("srcintf", &policy.srcintf), ("dstintf", &policy.dstintf)] {
                if refs.iter().any(|r| r.is_any()) {
                    findings.push(policy_finding(
                        self,
                        policy,
                        format!("{field} is `any`"),
                    ));
                }
            }
        }
        findings
    }
}

pub struct DisabledPolicy;

impl AuditRule for DisabledPolicy {
    fn id(&self) -> &'static str {
        "disabled_policy"
    }

    fn description(&self) -> &'static str {
        "policies left in the table with status disable"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        model
            .policies()
            .iter()
            .filter(|p| !p.enabled)
            .map(|p| policy_finding(self, p, "policy is disabled"))
            .collect()
    }
}
