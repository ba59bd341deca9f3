//! Typed object model.
//!
//! Every entity lives in a per-kind arena in declaration order and is addressed
//! by a [`Handle`]. Cross references are stored as [`Reference`]s whose
//! [`Target`] is filled in by the resolution pass; consumers never look names
//! up on their own.
//!
//! [`ModelBuilder`] is the mutable form used while loading. Once
//! [`crate::resolve::resolve`] has run, the resulting [`ObjectModel`] is
//! read-only.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;
use tracing::warn;

use crate::diagnostics::Diagnostic;
use crate::net::{Ipv4Range, PortRange};
use crate::packet::Protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Interface,
    Zone,
    Address,
    Service,
    Policy,
    Route,
    Vip,
    VipGroup,
    IpPool,
    CentralSnat,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 10] = [
        ObjectKind::Interface,
        ObjectKind::Zone,
        ObjectKind::Address,
        ObjectKind::Service,
        ObjectKind::Policy,
        ObjectKind::Route,
        ObjectKind::Vip,
        ObjectKind::VipGroup,
        ObjectKind::IpPool,
        ObjectKind::CentralSnat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Interface => "interface",
            ObjectKind::Zone => "zone",
            ObjectKind::Address => "address",
            ObjectKind::Service => "service",
            ObjectKind::Policy => "policy",
            ObjectKind::Route => "route",
            ObjectKind::Vip => "vip",
            ObjectKind::VipGroup => "vip_group",
            ObjectKind::IpPool => "ip_pool",
            ObjectKind::CentralSnat => "central_snat",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable index of an entity inside its kind's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle {
    pub kind: ObjectKind,
    pub index: usize,
}

/// What a name reference points at after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A reserved wildcard token (`any`, `all`, `ALL`).
    Any,
    Object(Handle),
    /// Not resolved (yet, or ever).
    Unresolved,
}

/// A by-name reference from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub name: String,
    pub target: Target,
}

impl Reference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: Target::Unresolved,
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        match self.target {
            Target::Object(handle) => Some(handle),
            Target::Any | Target::Unresolved => None,
        }
    }

    pub fn is_any(&self) -> bool {
        self.target == Target::Any
    }

    pub fn is_unresolved(&self) -> bool {
        self.target == Target::Unresolved
    }
}

/// Turn the value tokens of a multi-value setting into references.
pub fn references(values: &[String]) -> Vec<Reference> {
    values.iter().map(Reference::named).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Physical,
    Vlan,
    Tunnel,
    Loopback,
    Aggregate,
    Other(String),
}

impl InterfaceKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "physical" => InterfaceKind::Physical,
            "vlan" => InterfaceKind::Vlan,
            "tunnel" => InterfaceKind::Tunnel,
            "loopback" => InterfaceKind::Loopback,
            "aggregate" | "redundant" => InterfaceKind::Aggregate,
            other => InterfaceKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            InterfaceKind::Physical => "physical",
            InterfaceKind::Vlan => "vlan",
            InterfaceKind::Tunnel => "tunnel",
            InterfaceKind::Loopback => "loopback",
            InterfaceKind::Aggregate => "aggregate",
            InterfaceKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub line: usize,
    pub vdom: Option<String>,
    /// Interface address with its mask. `None` when unset or `0.0.0.0 0.0.0.0`.
    pub address: Option<Ipv4Network>,
    /// `config secondaryip` subnets.
    pub secondary: Vec<Ipv4Network>,
    pub status: AdminStatus,
    pub kind: InterfaceKind,
    /// FortiOS role (`lan`, `wan`, `dmz`, `undefined`).
    pub role: Option<String>,
    pub alias: Option<String>,
    pub parent: Option<String>,
    pub vlan_id: Option<u16>,
    pub allow_access: Vec<String>,
    /// Zone claiming this interface. Filled in by resolution.
    pub zone: Option<Handle>,
}

impl Interface {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            vdom: None,
            address: None,
            secondary: Vec::new(),
            status: AdminStatus::Up,
            kind: InterfaceKind::Physical,
            role: None,
            alias: None,
            parent: None,
            vlan_id: None,
            allow_access: Vec::new(),
            zone: None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == AdminStatus::Up
    }

    /// Primary subnet first, then secondary subnets in declaration order.
    pub fn subnets(&self) -> impl Iterator<Item = Ipv4Network> + '_ {
        self.address.into_iter().chain(self.secondary.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub name: String,
    pub line: usize,
    pub members: Vec<Reference>,
    pub intrazone_allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Subnet(Ipv4Network),
    Range(Ipv4Range),
    Fqdn(String),
    Group(Vec<Reference>),
    /// Geography, wildcard, dynamic and other types that cannot be matched offline.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: String,
    pub line: usize,
    pub kind: AddressKind,
    pub comment: Option<String>,
    pub associated_interface: Option<String>,
}

impl Address {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, AddressKind::Group(_))
    }

    pub fn members(&self) -> &[Reference] {
        match &self.kind {
            AddressKind::Group(members) => members,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ports {
        tcp: Vec<PortRange>,
        udp: Vec<PortRange>,
        sctp: Vec<PortRange>,
    },
    /// ICMP, optionally restricted to one type.
    Icmp { icmp_type: Option<u8> },
    /// Raw IP protocol number. `0` means every protocol.
    Ip { protocol: u8 },
    Group(Vec<Reference>),
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub line: usize,
    pub kind: ServiceKind,
    pub category: Option<String>,
    pub comment: Option<String>,
}

impl Service {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ServiceKind::Group(_))
    }

    pub fn members(&self) -> &[Reference] {
        match &self.kind {
            ServiceKind::Group(members) => members,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Accept,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTraffic {
    All,
    Utm,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    /// The `edit` key as written.
    pub name: String,
    pub id: u32,
    pub line: usize,
    /// The `set name` label.
    pub title: Option<String>,
    pub srcintf: Vec<Reference>,
    pub dstintf: Vec<Reference>,
    pub srcaddr: Vec<Reference>,
    pub dstaddr: Vec<Reference>,
    pub service: Vec<Reference>,
    pub srcaddr_negate: bool,
    pub dstaddr_negate: bool,
    pub service_negate: bool,
    pub action: PolicyAction,
    pub enabled: bool,
    pub nat: bool,
    pub ippool: bool,
    pub poolname: Vec<Reference>,
    pub logtraffic: LogTraffic,
    pub schedule: String,
    pub comments: Option<String>,
}

impl Policy {
    pub fn new(name: impl Into<String>, id: u32, line: usize) -> Self {
        Self {
            name: name.into(),
            id,
            line,
            title: None,
            srcintf: Vec::new(),
            dstintf: Vec::new(),
            srcaddr: Vec::new(),
            dstaddr: Vec::new(),
            service: Vec::new(),
            srcaddr_negate: false,
            dstaddr_negate: false,
            service_negate: false,
            action: PolicyAction::Deny,
            enabled: true,
            nat: false,
            ippool: false,
            poolname: Vec::new(),
            logtraffic: LogTraffic::Utm,
            schedule: "always".to_string(),
            comments: None,
        }
    }

    /// `12` or `12 (web-out)` when the policy carries a name.
    pub fn label(&self) -> String {
        match &self.title {
            Some(title) => format!("{} ({title})", self.id),
            None => self.id.to_string(),
        }
    }

    pub fn permits(&self) -> bool {
        self.action == PolicyAction::Accept
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRoute {
    pub name: String,
    pub seq: u32,
    pub line: usize,
    pub dst: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
    pub device: Option<Reference>,
    pub distance: u8,
    pub priority: u32,
    pub enabled: bool,
    pub blackhole: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vip {
    pub name: String,
    pub line: usize,
    pub ext_ip: Option<Ipv4Range>,
    pub mapped_ip: Option<Ipv4Range>,
    pub ext_intf: Reference,
    pub port_forward: bool,
    pub protocol: Protocol,
    pub ext_port: Option<PortRange>,
    pub mapped_port: Option<PortRange>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VipGroup {
    pub name: String,
    pub line: usize,
    pub interface: Reference,
    pub members: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpPool {
    pub name: String,
    pub line: usize,
    pub range: Option<Ipv4Range>,
    pub pool_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CentralSnat {
    pub name: String,
    pub id: u32,
    pub line: usize,
    pub enabled: bool,
    pub srcintf: Vec<Reference>,
    pub dstintf: Vec<Reference>,
    pub orig_addr: Vec<Reference>,
    pub dst_addr: Vec<Reference>,
    pub nat_ippool: Vec<Reference>,
    pub nat: bool,
    pub comments: Option<String>,
}

/// Result of flattening one address or service group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Expansion {
    /// Non-group members reachable from the group, first occurrence order.
    pub leaves: Vec<Handle>,
    /// A wildcard member (`all`) is reachable.
    pub any: bool,
    /// Names of unresolved members anywhere below the group.
    pub unresolved: Vec<String>,
    /// The group can reach itself and therefore expands to nothing.
    pub cyclic: bool,
    /// Cyclic member groups that were treated as empty.
    pub cyclic_members: Vec<String>,
    /// Nesting depth; a group of plain objects has depth 1.
    pub depth: usize,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        !self.any && self.leaves.is_empty()
    }
}

/// Common shape of every arena entity.
pub trait Entity: Sized {
    const KIND: ObjectKind;
    fn name(&self) -> &str;
    fn line(&self) -> usize;
    fn arena(model: &ObjectModel) -> &[Self];
    fn arena_mut(builder: &mut ModelBuilder) -> &mut Vec<Self>;
}

macro_rules! entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Entity for $ty {
            const KIND: ObjectKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn line(&self) -> usize {
                self.line
            }

            fn arena(model: &ObjectModel) -> &[Self] {
                &model.$field
            }

            fn arena_mut(builder: &mut ModelBuilder) -> &mut Vec<Self> {
                &mut builder.$field
            }
        }
    };
}

entity!(Interface, ObjectKind::Interface, interfaces);
entity!(Zone, ObjectKind::Zone, zones);
entity!(Address, ObjectKind::Address, addresses);
entity!(Service, ObjectKind::Service, services);
entity!(Policy, ObjectKind::Policy, policies);
entity!(StaticRoute, ObjectKind::Route, routes);
entity!(Vip, ObjectKind::Vip, vips);
entity!(VipGroup, ObjectKind::VipGroup, vip_groups);
entity!(IpPool, ObjectKind::IpPool, ip_pools);
entity!(CentralSnat, ObjectKind::CentralSnat, central_snat);

/// Mutable collection of entities while the configuration is being loaded.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub vdom: Option<String>,
    pub central_nat: bool,
    pub interfaces: Vec<Interface>,
    pub zones: Vec<Zone>,
    pub addresses: Vec<Address>,
    pub services: Vec<Service>,
    pub policies: Vec<Policy>,
    pub routes: Vec<StaticRoute>,
    pub vips: Vec<Vip>,
    pub vip_groups: Vec<VipGroup>,
    pub ip_pools: Vec<IpPool>,
    pub central_snat: Vec<CentralSnat>,
}

impl ModelBuilder {
    /// Finalize one `edit` entry. A later definition of the same name replaces
    /// the earlier one in place, so sequence order follows the first `edit`.
    pub fn insert<T: Entity>(&mut self, item: T, diagnostics: &mut Vec<Diagnostic>) {
        let items = T::arena_mut(self);
        let Some(pos) = items.iter().position(|e| e.name() == item.name()) else {
            items.push(item);
            return;
        };
        warn!(
            kind = %T::KIND,
            name = item.name(),
            first_line = items[pos].line(),
            line = item.line(),
            "duplicate definition, later one wins"
        );
        diagnostics.push(Diagnostic::DuplicateName {
            kind: T::KIND,
            name: item.name().to_string(),
            first_line: items[pos].line(),
            line: item.line(),
        });
        items[pos] = item;
    }
}

/// Resolved, read-only configuration snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectModel {
    pub(crate) hostname: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) vdom: Option<String>,
    pub(crate) central_nat: bool,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) zones: Vec<Zone>,
    pub(crate) addresses: Vec<Address>,
    pub(crate) services: Vec<Service>,
    pub(crate) policies: Vec<Policy>,
    pub(crate) routes: Vec<StaticRoute>,
    pub(crate) vips: Vec<Vip>,
    pub(crate) vip_groups: Vec<VipGroup>,
    pub(crate) ip_pools: Vec<IpPool>,
    pub(crate) central_snat: Vec<CentralSnat>,
    pub(crate) address_expansions: BTreeMap<usize, Expansion>,
    pub(crate) service_expansions: BTreeMap<usize, Expansion>,
    #[serde(skip)]
    pub(crate) index: HashMap<(ObjectKind, String), usize>,
}

impl ObjectModel {
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn vdom(&self) -> Option<&str> {
        self.vdom.as_deref()
    }

    pub fn central_nat(&self) -> bool {
        self.central_nat
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Policies in evaluation order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn routes(&self) -> &[StaticRoute] {
        &self.routes
    }

    pub fn vips(&self) -> &[Vip] {
        &self.vips
    }

    pub fn vip_groups(&self) -> &[VipGroup] {
        &self.vip_groups
    }

    pub fn ip_pools(&self) -> &[IpPool] {
        &self.ip_pools
    }

    pub fn central_snat_rules(&self) -> &[CentralSnat] {
        &self.central_snat
    }

    /// Look an entity up by kind and name. Missing names are `None`, never an error.
    pub fn lookup(&self, kind: ObjectKind, name: &str) -> Option<Handle> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&index| Handle { kind, index })
    }

    /// Typed access through a handle. Returns `None` for a handle of another kind.
    pub fn get<T: Entity>(&self, handle: Handle) -> Option<&T> {
        if handle.kind != T::KIND {
            return None;
        }
        T::arena(self).get(handle.index)
    }

    pub fn find<T: Entity>(&self, name: &str) -> Option<&T> {
        self.lookup(T::KIND, name).and_then(|h| self.get(h))
    }

    pub fn interface(&self, handle: Handle) -> Option<&Interface> {
        self.get(handle)
    }

    pub fn zone(&self, handle: Handle) -> Option<&Zone> {
        self.get(handle)
    }

    pub fn address(&self, handle: Handle) -> Option<&Address> {
        self.get(handle)
    }

    pub fn service(&self, handle: Handle) -> Option<&Service> {
        self.get(handle)
    }

    pub fn vip(&self, handle: Handle) -> Option<&Vip> {
        self.get(handle)
    }

    pub fn vip_group(&self, handle: Handle) -> Option<&VipGroup> {
        self.get(handle)
    }

    pub fn ip_pool(&self, handle: Handle) -> Option<&IpPool> {
        self.get(handle)
    }

    /// Name of whatever the handle points at.
    pub fn name_of(&self, handle: Handle) -> Option<&str> {
        match handle.kind {
            ObjectKind::Interface => self.get::<Interface>(handle).map(Entity::name),
            ObjectKind::Zone => self.get::<Zone>(handle).map(Entity::name),
            ObjectKind::Address => self.get::<Address>(handle).map(Entity::name),
            ObjectKind::Service => self.get::<Service>(handle).map(Entity::name),
            ObjectKind::Policy => self.get::<Policy>(handle).map(Entity::name),
            ObjectKind::Route => self.get::<StaticRoute>(handle).map(Entity::name),
            ObjectKind::Vip => self.get::<Vip>(handle).map(Entity::name),
            ObjectKind::VipGroup => self.get::<VipGroup>(handle).map(Entity::name),
            ObjectKind::IpPool => self.get::<IpPool>(handle).map(Entity::name),
            ObjectKind::CentralSnat => self.get::<CentralSnat>(handle).map(Entity::name),
        }
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Interface => self.interfaces.len(),
            ObjectKind::Zone => self.zones.len(),
            ObjectKind::Address => self.addresses.len(),
            ObjectKind::Service => self.services.len(),
            ObjectKind::Policy => self.policies.len(),
            ObjectKind::Route => self.routes.len(),
            ObjectKind::Vip => self.vips.len(),
            ObjectKind::VipGroup => self.vip_groups.len(),
            ObjectKind::IpPool => self.ip_pools.len(),
            ObjectKind::CentralSnat => self.central_snat.len(),
        }
    }

    /// Zone that claims the interface, if any.
    pub fn zone_of(&self, interface: Handle) -> Option<&Zone> {
        self.interface(interface)
            .and_then(|i| i.zone)
            .and_then(|z| self.zone(z))
    }

    /// Precomputed expansion of an address group. `None` for non-groups.
    pub fn address_expansion(&self, handle: Handle) -> Option<&Expansion> {
        (handle.kind == ObjectKind::Address)
            .then(|| self.address_expansions.get(&handle.index))
            .flatten()
    }

    /// Precomputed expansion of a service group. `None` for non-groups.
    pub fn service_expansion(&self, handle: Handle) -> Option<&Expansion> {
        (handle.kind == ObjectKind::Service)
            .then(|| self.service_expansions.get(&handle.index))
            .flatten()
    }

    /// Interfaces with at least one configured subnet, in declaration order.
    pub fn addressed_interfaces(&self) -> impl Iterator<Item = (Handle, &Interface)> {
        self.interfaces
            .iter()
            .enumerate()
            .filter(|(_, i)| i.subnets().next().is_some())
            .map(|(index, i)| {
                (
                    Handle {
                        kind: ObjectKind::Interface,
                        index,
                    },
                    i,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, AddressKind, Entity, ModelBuilder, ObjectKind, Policy};
    use crate::diagnostics::Diagnostic;

    fn address(name: &str, line: usize) -> Address {
        Address {
            name: name.to_string(),
            line,
            kind: AddressKind::Fqdn("example.com".to_string()),
            comment: None,
            associated_interface: None,
        }
    }

    #[test]
    fn later_duplicate_replaces_the_first_in_place() {
        let mut builder = ModelBuilder::default();
        let mut diags = Vec::new();
        builder.insert(address("a", 2), &mut diags);
        builder.insert(address("b", 5), &mut diags);
        builder.insert(address("a", 9), &mut diags);

        let names: Vec<(&str, usize)> = builder
            .addresses
            .iter()
            .map(|a| (a.name(), a.line()))
            .collect();
        assert_eq!(names, [("a", 9), ("b", 5)]);
        assert_eq!(
            diags,
            [Diagnostic::DuplicateName {
                kind: ObjectKind::Address,
                name: "a".to_string(),
                first_line: 2,
                line: 9,
            }]
        );
    }

    #[test]
    fn policy_defaults_follow_fortios() {
        let policy = Policy::new("7", 7, 1);
        assert!(!policy.permits());
        assert!(policy.enabled);
        assert!(!policy.nat);
        assert_eq!(policy.label(), "7");
    }
}
