//! Unreachable policies.
//!
//! Evaluation is first-match-wins, so a policy whose whole match space lies
//! inside an earlier enabled policy never sees traffic. Match spaces are
//! compared per field: interfaces with zones expanded, addresses as merged
//! IPv4 intervals, services as per-protocol port intervals. Policies with
//! negated or unresolvable fields are left alone.

use crate::audit::{AuditConfig, AuditRule, Finding, Severity};
use crate::matching::{
    address_coverage, interface_coverage, service_coverage, AddressCoverage, InterfaceCoverage,
    ServiceCoverage,
};
use crate::model::{ObjectKind, ObjectModel, Policy};

struct MatchSpace<'p> {
    policy: &'p Policy,
    srcintf: InterfaceCoverage,
    dstintf: InterfaceCoverage,
    srcaddr: AddressCoverage,
    dstaddr: AddressCoverage,
    service: ServiceCoverage,
}

impl<'p> MatchSpace<'p> {
    fn of(model: &ObjectModel, policy: &'p Policy) -> Option<Self> {
        if policy.srcaddr_negate || policy.dstaddr_negate || policy.service_negate {
            return None;
        }
        Some(Self {
            policy,
            srcintf: interface_coverage(model, &policy.srcintf)?,
            dstintf: interface_coverage(model, &policy.dstintf)?,
            srcaddr: address_coverage(model, &policy.srcaddr)?,
            dstaddr: address_coverage(model, &policy.dstaddr)?,
            service: service_coverage(model, &policy.service)?,
        })
    }

    fn covers(&self, other: &MatchSpace<'_>) -> bool {
        self.srcintf.covers(&other.srcintf)
            && self.dstintf.covers(&other.dstintf)
            && self.srcaddr.covers(&other.srcaddr)
            && self.dstaddr.covers(&other.dstaddr)
            && self.service.covers(&other.service)
    }
}

pub struct ShadowedPolicy;

impl AuditRule for ShadowedPolicy {
    fn id(&self) -> &'static str {
        "shadowed_policy"
    }

    fn description(&self) -> &'static str {
        "policies that can never match because an earlier policy covers them"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let spaces: Vec<MatchSpace<'_>> = model
            .policies()
            .iter()
            .filter(|p| p.enabled)
            .filter_map(|p| MatchSpace::of(model, p))
            .collect();

        let mut findings = Vec::new();
        for (i, later) in spaces.iter().enumerate() {
            let Some(earlier) = spaces[..i].iter().find(|e| e.covers(later)) else {
                continue;
            };
            let message = if later.covers(earlier) && earlier.policy.action == later.policy.action {
                format!("duplicate of policy {}", earlier.policy.label())
            } else {
                format!(
                    "shadowed by policy {}; it can never match",
                    earlier.policy.label()
                )
            };
            findings.push(Finding::new(
                self,
                ObjectKind::Policy,
                later.policy.label(),
                message,
            ));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ShadowedPolicy;
    use crate::audit::rules::fixture::{basic, entities, model, run};

    #[test]
    fn narrower_later_policy_is_shadowed() {
        let findings = run(&ShadowedPolicy, &basic());
        assert_eq!(entities(&findings), ["2 (lan-https-pool)"]);
        assert_eq!(
            findings[0].message,
            "shadowed by policy 1 (lan-web-out); it can never match"
        );
    }

    #[test]
    fn identical_policies_are_duplicates_and_disjoint_ones_are_not() {
        let text = r#"config firewall address
edit a
set subnet 10.0.0.0/24
next
edit b
set subnet 10.0.1.0/24
next
end
config firewall policy
edit 1
set srcintf any
set dstintf any
set srcaddr a
set dstaddr all
set service ALL
set action accept
next
edit 2
set srcintf any
set dstintf any
set srcaddr a
set dstaddr all
set service ALL
set action accept
next
edit 3
set srcintf any
set dstintf any
set srcaddr b
set dstaddr all
set service ALL
set action accept
next
end
"#;
        let findings = run(&ShadowedPolicy, &model(text));
        assert_eq!(entities(&findings), ["2"]);
        assert_eq!(findings[0].message, "duplicate of policy 1");
    }
}
