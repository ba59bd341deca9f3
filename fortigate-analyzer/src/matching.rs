use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use crate::model::{
    Address, AddressKind, Handle, ObjectKind, ObjectModel, Reference, Service, ServiceKind, Target,
    Vip,
};
use crate::net::{is_unspecified, network_bounds, IntervalSet};
use crate::packet::Protocol;

/// True when `refs` names `any`, the interface itself, or the zone that claims it.
///
/// An unknown interface (`None`) is only matched by `any`.
pub fn interface_matches(model: &ObjectModel, refs: &[Reference], interface: Option<Handle>) -> bool {
    refs.iter().any(|r| match r.target {
        Target::Any => true,
        Target::Unresolved => false,
        Target::Object(handle) => interface.is_some_and(|iface| {
            handle == iface
                || (handle.kind == ObjectKind::Zone
                    && model.interface(iface).and_then(|i| i.zone) == Some(handle))
        }),
    })
}

/// Flattened view of one policy field after group expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    pub any: bool,
    /// Non-group members in first-occurrence order. Address fields may also
    /// hold VIP handles (VIP groups are expanded to their VIPs).
    pub leaves: Vec<Handle>,
    pub unresolved: Vec<String>,
    /// Groups that expanded to nothing, either empty or on a cycle.
    pub empty_groups: Vec<String>,
}

impl Flattened {
    fn push_leaf(&mut self, handle: Handle) {
        if !self.leaves.contains(&handle) {
            self.leaves.push(handle);
        }
    }

    /// Nothing in the field can ever match.
    pub fn is_empty(&self) -> bool {
        !self.any && self.leaves.is_empty()
    }
}

pub fn flatten_addresses(model: &ObjectModel, refs: &[Reference]) -> Flattened {
    let mut out = Flattened::default();
    for reference in refs {
        match reference.target {
            Target::Any => out.any = true,
            Target::Unresolved => out.unresolved.push(reference.name.clone()),
            Target::Object(handle) => match handle.kind {
                ObjectKind::Address => match model.address_expansion(handle) {
                    Some(expansion) => {
                        out.any |= expansion.any;
                        for leaf in &expansion.leaves {
                            out.push_leaf(*leaf);
                        }
                        out.unresolved.extend(expansion.unresolved.iter().cloned());
                        if expansion.is_empty() {
                            out.empty_groups.push(reference.name.clone());
                        }
                    }
                    None => out.push_leaf(handle),
                },
                ObjectKind::VipGroup => {
                    let members = model.vip_group(handle).map(|g| g.members.as_slice());
                    let vips: Vec<Handle> = members
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(Reference::handle)
                        .collect();
                    if vips.is_empty() {
                        out.empty_groups.push(reference.name.clone());
                    }
                    for vip in vips {
                        out.push_leaf(vip);
                    }
                }
                _ => out.push_leaf(handle),
            },
        }
    }
    out
}

pub fn flatten_services(model: &ObjectModel, refs: &[Reference]) -> Flattened {
    let mut out = Flattened::default();
    for reference in refs {
        match reference.target {
            Target::Any => out.any = true,
            Target::Unresolved => out.unresolved.push(reference.name.clone()),
            Target::Object(handle) => match model.service_expansion(handle) {
                Some(expansion) => {
                    out.any |= expansion.any;
                    for leaf in &expansion.leaves {
                        out.push_leaf(*leaf);
                    }
                    out.unresolved.extend(expansion.unresolved.iter().cloned());
                    if expansion.is_empty() {
                        out.empty_groups.push(reference.name.clone());
                    }
                }
                None => out.push_leaf(handle),
            },
        }
    }
    out
}

/// Whether an address object contains `ip`. `None` when the object cannot be
/// evaluated offline (FQDN, geography, dynamic).
pub fn address_contains(address: &Address, ip: Ipv4Addr) -> Option<bool> {
    match &address.kind {
        AddressKind::Subnet(net) => Some(net.contains(ip)),
        AddressKind::Range(range) => Some(range.contains(ip)),
        AddressKind::Fqdn(_) | AddressKind::Unsupported(_) => None,
        AddressKind::Group(_) => Some(false),
    }
}

/// Whether a packet addressed to `dst` hits the VIP's external side.
///
/// `ingress` of `None` only matches VIPs bound to `any`.
pub fn vip_matches(
    model: &ObjectModel,
    vip: &Vip,
    dst: Ipv4Addr,
    protocol: Protocol,
    port: Option<u16>,
    ingress: Option<Handle>,
) -> bool {
    let Some(ext) = vip.ext_ip else {
        return false;
    };
    if !ext.contains(dst) {
        return false;
    }
    if !interface_matches(model, std::slice::from_ref(&vip.ext_intf), ingress) {
        return false;
    }
    if vip.port_forward {
        if protocol != vip.protocol {
            return false;
        }
        if let (Some(range), Some(port)) = (vip.ext_port, port) {
            return range.contains(port);
        }
    }
    true
}

/// Whether a service object admits the protocol/port pair. `None` for
/// service types that cannot be evaluated.
///
/// A packet without a port matches any port-based entry for its protocol.
pub fn service_matches(service: &Service, protocol: Protocol, port: Option<u16>) -> Option<bool> {
    match &service.kind {
        ServiceKind::Ports { tcp, udp, sctp } => {
            let ranges = match protocol {
                Protocol::Tcp => tcp,
                Protocol::Udp => udp,
                Protocol::Sctp => sctp,
                Protocol::Icmp | Protocol::Ip(_) => return Some(false),
            };
            Some(match port {
                Some(port) => ranges.iter().any(|r| r.contains(port)),
                None => !ranges.is_empty(),
            })
        }
        ServiceKind::Icmp { icmp_type } => Some(
            protocol == Protocol::Icmp
                && match (icmp_type, port) {
                    (None, _) | (Some(_), None) => true,
                    (Some(expected), Some(actual)) => u16::from(*expected) == actual,
                },
        ),
        ServiceKind::Ip { protocol: 0 } => Some(true),
        ServiceKind::Ip { protocol: number } => Some(protocol.number() == *number),
        ServiceKind::Group(_) => Some(false),
        ServiceKind::Unsupported(_) => None,
    }
}

/// Address space covered by a policy field, for subset checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressCoverage {
    pub any: bool,
    pub ranges: IntervalSet,
    /// Objects with no numeric extent (FQDNs, VIPs) only cover themselves.
    pub tokens: BTreeSet<String>,
}

impl AddressCoverage {
    pub fn covers(&self, other: &AddressCoverage) -> bool {
        if self.any {
            return true;
        }
        !other.any && self.ranges.covers(&other.ranges) && other.tokens.is_subset(&self.tokens)
    }
}

/// Coverage of an address field, or `None` when it depends on something
/// unresolved or empty.
pub fn address_coverage(model: &ObjectModel, refs: &[Reference]) -> Option<AddressCoverage> {
    let flat = flatten_addresses(model, refs);
    if !flat.unresolved.is_empty() || !flat.empty_groups.is_empty() || flat.is_empty() {
        return None;
    }
    let mut coverage = AddressCoverage {
        any: flat.any,
        ..AddressCoverage::default()
    };
    for leaf in flat.leaves {
        if leaf.kind == ObjectKind::Vip {
            if let Some(vip) = model.vip(leaf) {
                coverage.tokens.insert(format!("vip:{}", vip.name));
            }
            continue;
        }
        let Some(address) = model.address(leaf) else {
            continue;
        };
        match &address.kind {
            AddressKind::Subnet(net) if is_unspecified(net) => coverage.any = true,
            AddressKind::Subnet(net) => {
                let (lo, hi) = network_bounds(net);
                coverage.ranges.insert(lo, hi);
            }
            AddressKind::Range(range) => {
                let (lo, hi) = range.bounds();
                coverage.ranges.insert(lo, hi);
            }
            AddressKind::Fqdn(fqdn) => {
                coverage.tokens.insert(format!("fqdn:{fqdn}"));
            }
            AddressKind::Unsupported(_) | AddressKind::Group(_) => {
                coverage.tokens.insert(format!("address:{}", address.name));
            }
        }
    }
    Some(coverage)
}

const ALL_PORTS: (u32, u32) = (0, 65535);

/// Protocol/port space covered by a service field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCoverage {
    pub any: bool,
    /// Port (or ICMP type) intervals per IP protocol number.
    pub by_protocol: BTreeMap<u8, IntervalSet>,
    pub tokens: BTreeSet<String>,
}

impl ServiceCoverage {
    fn add(&mut self, protocol: u8, low: u32, high: u32) {
        self.by_protocol.entry(protocol).or_default().insert(low, high);
    }

    pub fn covers(&self, other: &ServiceCoverage) -> bool {
        if self.any {
            return true;
        }
        !other.any
            && other.tokens.is_subset(&self.tokens)
            && other.by_protocol.iter().all(|(protocol, ranges)| {
                self.by_protocol
                    .get(protocol)
                    .is_some_and(|mine| mine.covers(ranges))
            })
    }
}

pub fn service_coverage(model: &ObjectModel, refs: &[Reference]) -> Option<ServiceCoverage> {
    let flat = flatten_services(model, refs);
    if !flat.unresolved.is_empty() || !flat.empty_groups.is_empty() || flat.is_empty() {
        return None;
    }
    let mut coverage = ServiceCoverage {
        any: flat.any,
        ..ServiceCoverage::default()
    };
    for service in flat.leaves.into_iter().filter_map(|h| model.service(h)) {
        match &service.kind {
            ServiceKind::Ports { tcp, udp, sctp } => {
                for (protocol, ranges) in [
                    (Protocol::Tcp, tcp),
                    (Protocol::Udp, udp),
                    (Protocol::Sctp, sctp),
                ] {
                    for range in ranges {
                        coverage.add(protocol.number(), u32::from(range.low), u32::from(range.high));
                    }
                }
            }
            ServiceKind::Icmp {
                icmp_type: Some(icmp_type),
            } => coverage.add(1, u32::from(*icmp_type), u32::from(*icmp_type)),
            ServiceKind::Icmp { icmp_type: None } => coverage.add(1, ALL_PORTS.0, ALL_PORTS.1),
            ServiceKind::Ip { protocol: 0 } => coverage.any = true,
            ServiceKind::Ip { protocol } => coverage.add(*protocol, ALL_PORTS.0, ALL_PORTS.1),
            ServiceKind::Group(_) | ServiceKind::Unsupported(_) => {
                coverage.tokens.insert(service.name.clone());
            }
        }
    }
    Some(coverage)
}

/// Interfaces covered by a `srcintf`/`dstintf` field, zones expanded to members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCoverage {
    pub any: bool,
    pub names: BTreeSet<String>,
}

impl InterfaceCoverage {
    pub fn covers(&self, other: &InterfaceCoverage) -> bool {
        self.any || (!other.any && other.names.is_subset(&self.names))
    }
}

pub fn interface_coverage(model: &ObjectModel, refs: &[Reference]) -> Option<InterfaceCoverage> {
    let mut coverage = InterfaceCoverage::default();
    for reference in refs {
        match reference.target {
            Target::Any => coverage.any = true,
            Target::Unresolved => return None,
            Target::Object(handle) if handle.kind == ObjectKind::Zone => {
                let members: Vec<&str> = model
                    .interfaces()
                    .iter()
                    .filter(|i| i.zone == Some(handle))
                    .map(|i| i.name.as_str())
                    .collect();
                if members.is_empty() {
                    coverage.names.insert(format!("zone:{}", reference.name));
                }
                coverage.names.extend(members.into_iter().map(str::to_string));
            }
            Target::Object(_) => {
                coverage.names.insert(reference.name.clone());
            }
        }
    }
    (coverage.any || !coverage.names.is_empty()).then_some(coverage)
}
