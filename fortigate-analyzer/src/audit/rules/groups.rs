use crate::audit::{AuditConfig, AuditRule, Finding, Severity};
use crate::model::{Expansion, Handle, ObjectKind, ObjectModel};

/// Every address and service group with its name and precomputed expansion.
fn groups(model: &ObjectModel) -> Vec<(ObjectKind, &str, &Expansion)> {
    let addresses = model.addresses().iter().enumerate().filter_map(|(index, a)| {
        let handle = Handle {
            kind: ObjectKind::Address,
            index,
        };
        model
            .address_expansion(handle)
            .map(|e| (ObjectKind::Address, a.name.as_str(), e))
    });
    let services = model.services().iter().enumerate().filter_map(|(index, s)| {
        let handle = Handle {
            kind: ObjectKind::Service,
            index,
        };
        model
            .service_expansion(handle)
            .map(|e| (ObjectKind::Service, s.name.as_str(), e))
    });
    addresses.chain(services).collect()
}

pub struct EmptyGroup;

impl AuditRule for EmptyGroup {
    fn id(&self) -> &'static str {
        "empty_group"
    }

    fn description(&self) -> &'static str {
        "groups that expand to no usable member"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let mut findings: Vec<Finding> = groups(model)
            .into_iter()
            .filter(|(_, _, e)| e.is_empty() && !e.cyclic)
            .map(|(kind, name, _)| Finding::new(self, kind, name, "group expands to no members"))
            .collect();
        findings.extend(
            model
                .vip_groups()
                .iter()
                .filter(|g| g.members.iter().all(|m| m.handle().is_none()))
                .map(|g| {
                    Finding::new(self, ObjectKind::VipGroup, &g.name, "group has no resolvable VIP")
                }),
        );
        findings
    }
}

pub struct GroupCycle;

impl AuditRule for GroupCycle {
    fn id(&self) -> &'static str {
        "group_cycle"
    }

    fn description(&self) -> &'static str {
        "groups that contain themselves through nesting"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        groups(model)
            .into_iter()
            .filter(|(_, _, e)| e.cyclic)
            .map(|(kind, name, _)| {
                Finding::new(
                    self,
                    kind,
                    name,
                    "group is part of a membership cycle and matches nothing",
                )
            })
            .collect()
    }
}

pub struct DeepGroupNesting;

impl AuditRule for DeepGroupNesting {
    fn id(&self) -> &'static str {
        "deep_group_nesting"
    }

    fn description(&self) -> &'static str {
        "groups nested deeper than max_group_depth"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn evaluate(&self, model: &ObjectModel, config: &AuditConfig) -> Vec<Finding> {
        groups(model)
            .into_iter()
            .filter(|(_, _, e)| e.depth > config.max_group_depth)
            .map(|(kind, name, e)| {
                Finding::new(
                    self,
                    kind,
                    name,
                    format!(
                        "nesting depth {} exceeds {}",
                        e.depth, config.max_group_depth
                    ),
                )
            })
            .collect()
    }
}
