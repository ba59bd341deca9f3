use std::collections::HashSet;

use crate::audit::{AuditConfig, AuditRule, Finding, Severity};
use crate::model::{
    Address, Entity, Handle, IpPool, ObjectKind, ObjectModel, Reference, Service, Vip, VipGroup,
};
use crate::resolve::is_reserved_name;

/// Handles named by any policy, group, VIP group or central SNAT rule.
///
/// Disabled policies count: their objects are still in use by the table.
fn referenced(model: &ObjectModel) -> HashSet<Handle> {
    let mut lists: Vec<&[Reference]> = Vec::new();
    for policy in model.policies() {
        lists.extend([
            policy.srcaddr.as_slice(),
            policy.dstaddr.as_slice(),
            policy.service.as_slice(),
            policy.poolname.as_slice(),
        ]);
    }
    lists.extend(model.addresses().iter().map(|a| a.members()));
    lists.extend(model.services().iter().map(|s| s.members()));
    lists.extend(model.vip_groups().iter().map(|g| g.members.as_slice()));
    for rule in model.central_snat_rules() {
        lists.extend([
            rule.orig_addr.as_slice(),
            rule.dst_addr.as_slice(),
            rule.nat_ippool.as_slice(),
        ]);
    }
    lists
        .into_iter()
        .flatten()
        .filter_map(Reference::handle)
        .collect()
}

fn unused<T: Entity>(
    rule: &dyn AuditRule,
    model: &ObjectModel,
    used: &HashSet<Handle>,
    noun: &str,
) -> Vec<Finding> {
    T::arena(model)
        .iter()
        .enumerate()
        .filter(|(index, item)| {
            !is_reserved_name(T::KIND, item.name())
                && !used.contains(&Handle {
                    kind: T::KIND,
                    index: *index,
                })
        })
        .map(|(_, item)| {
            Finding::new(
                rule,
                T::KIND,
                item.name(),
                format!("{noun} is not referenced by any policy or group"),
            )
        })
        .collect()
}

pub struct UnusedObject;

impl AuditRule for UnusedObject {
    fn id(&self) -> &'static str {
        "unused_object"
    }

    fn description(&self) -> &'static str {
        "addresses, services, VIPs and IP pools nothing refers to"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let used = referenced(model);
        let mut findings = unused::<Address>(self, model, &used, "address");
        findings.extend(unused::<Service>(self, model, &used, "service"));
        findings.extend(unused::<Vip>(self, model, &used, "virtual IP"));
        findings.extend(unused::<VipGroup>(self, model, &used, "VIP group"));
        findings.extend(unused::<IpPool>(self, model, &used, "IP pool"));
        findings
    }
}

pub struct UnresolvedReference;

impl UnresolvedReference {
    fn scan(
        &self,
        findings: &mut Vec<Finding>,
        kind: ObjectKind,
        owner: &str,
        field: &str,
        refs: &[Reference],
    ) {
        for reference in refs.iter().filter(|r| r.is_unresolved()) {
            findings.push(Finding::new(
                self,
                kind,
                owner,
                format!("{field} references unknown `{}`", reference.name),
            ));
        }
    }
}

impl AuditRule for UnresolvedReference {
    fn id(&self) -> &'static str {
        "unresolved_reference"
    }

    fn description(&self) -> &'static str {
        "policies and groups naming objects that do not exist"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn evaluate(&self, model: &ObjectModel, _config: &AuditConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for policy in model.policies() {
            let owner = policy.label();
            for (field, refs) in [
                ("srcintf", &policy.srcintf),
                ("dstintf", &policy.dstintf),
                ("srcaddr", &policy.srcaddr),
                ("dstaddr", &policy.dstaddr),
                ("service", &policy.service),
                ("poolname", &policy.poolname),
            ] {
                self.scan(&mut findings, ObjectKind::Policy, &owner, field, refs);
            }
        }
        for address in model.addresses() {
            self.scan(
                &mut findings,
                ObjectKind::Address,
                &address.name,
                "member",
                address.members(),
            );
        }
        for service in model.services() {
            self.scan(
                &mut findings,
                ObjectKind::Service,
                &service.name,
                "member",
                service.members(),
            );
        }
        findings
    }
}
