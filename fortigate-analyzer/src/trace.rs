//! Path tracing simulator.
//!
//! [`simulate`] pushes one [`PacketDescriptor`] through the resolved model:
//! ingress interface, VIP pre-routing, route lookup, first-match policy scan,
//! then NAT. The result is a [`Trace`] of ordered steps with a terminal
//! [`Disposition`]. Anything the simulation had to guess about (unresolved
//! names, empty groups, FQDN objects) is recorded as a [`SimulationCaveat`]
//! on the trace instead of failing.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use colored::Colorize;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use tracing::{debug, trace};

use crate::matching::{
    address_contains, flatten_addresses, flatten_services, interface_matches, service_matches,
    vip_matches,
};
use crate::model::{Handle, ObjectKind, ObjectModel, Policy, Reference, Target, Vip};
use crate::packet::PacketDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Ingress,
    Route,
    Policy,
    Nat,
    Egress,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepKind::Ingress => "ingress",
            StepKind::Route => "route",
            StepKind::Policy => "policy",
            StepKind::Nat => "nat",
            StepKind::Egress => "egress",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub kind: StepKind,
    /// Name of the matched entity, `None` when nothing matched.
    pub matched: Option<String>,
    pub detail: BTreeMap<String, String>,
}

impl TraceStep {
    fn new(kind: StepKind, matched: Option<String>) -> Self {
        Self {
            kind,
            matched,
            detail: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.detail.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    Permit,
    DenyImplicit,
    DenyExplicit,
    NoRoute,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Disposition::Permit => "permit",
            Disposition::DenyImplicit => "deny-implicit",
            Disposition::DenyExplicit => "deny-explicit",
            Disposition::NoRoute => "no-route",
        })
    }
}

/// Something the trace relied on that could not be evaluated exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationCaveat {
    pub entity: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub packet: PacketDescriptor,
    pub steps: Vec<TraceStep>,
    pub disposition: Disposition,
    pub egress_interface: Option<String>,
    pub caveats: Vec<SimulationCaveat>,
}

impl Trace {
    pub fn step(&self, kind: StepKind) -> Option<&TraceStep> {
        self.steps.iter().find(|s| s.kind == kind)
    }
}

/// The route a destination resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChoice {
    /// `static <seq>` or `connected <interface>`.
    pub name: String,
    pub destination: Ipv4Network,
    pub distance: u8,
    pub gateway: Option<Ipv4Addr>,
    #[serde(skip)]
    pub egress: Option<Handle>,
    pub egress_name: Option<String>,
    pub blackhole: bool,
}

/// Longest-prefix match over enabled static routes and connected subnets.
///
/// Ties go to the lower distance, then to declaration order with static
/// routes ahead of connected ones. Routes bound to an interface that is
/// administratively down are ignored.
pub fn lookup_route(model: &ObjectModel, dst: Ipv4Addr) -> Option<RouteChoice> {
    let mut best: Option<RouteChoice> = None;
    let mut consider = |candidate: RouteChoice| {
        let better = match &best {
            None => true,
            Some(current) => {
                let (cp, np) = (current.destination.prefix(), candidate.destination.prefix());
                np > cp || (np == cp && candidate.distance < current.distance)
            }
        };
        if better {
            best = Some(candidate);
        }
    };

    for route in model.routes().iter().filter(|r| r.enabled) {
        if !route.dst.contains(dst) {
            continue;
        }
        let device = route.device.as_ref().and_then(Reference::handle);
        if device
            .and_then(|h| model.interface(h))
            .is_some_and(|i| !i.is_up())
        {
            continue;
        }
        let egress = match (&route.device, route.gateway) {
            (Some(_), _) => device,
            (None, Some(gateway)) => connected_interface(model, gateway),
            (None, None) => None,
        };
        consider(RouteChoice {
            name: format!("static {}", route.name),
            destination: route.dst,
            distance: route.distance,
            gateway: route.gateway,
            egress,
            egress_name: egress.and_then(|h| model.name_of(h)).map(str::to_string),
            blackhole: route.blackhole,
        });
    }

    for (handle, iface) in model.addressed_interfaces().filter(|(_, i)| i.is_up()) {
        for net in iface.subnets().filter(|n| n.contains(dst)) {
            let destination = Ipv4Network::new(net.network(), net.prefix()).unwrap_or(net);
            consider(RouteChoice {
                name: format!("connected {}", iface.name),
                destination,
                distance: 0,
                gateway: None,
                egress: Some(handle),
                egress_name: Some(iface.name.clone()),
                blackhole: false,
            });
        }
    }
    best
}

/// Up interface whose subnet contains `addr`, longest prefix first.
fn connected_interface(model: &ObjectModel, addr: Ipv4Addr) -> Option<Handle> {
    let mut best: Option<(u8, Handle)> = None;
    for (handle, iface) in model.addressed_interfaces().filter(|(_, i)| i.is_up()) {
        for net in iface.subnets().filter(|n| n.contains(addr)) {
            if best.map_or(true, |(prefix, _)| net.prefix() > prefix) {
                best = Some((net.prefix(), handle));
            }
        }
    }
    best.map(|(_, handle)| handle)
}

/// Simulate one packet. Pure: the same model and packet always give the same trace.
pub fn simulate(model: &ObjectModel, packet: &PacketDescriptor) -> Trace {
    let mut sim = Simulation {
        model,
        packet,
        steps: Vec::new(),
        caveats: Vec::new(),
    };
    let (disposition, egress) = sim.run();
    debug!(packet = %packet, disposition = %disposition, "trace complete");
    Trace {
        packet: packet.clone(),
        steps: sim.steps,
        disposition,
        egress_interface: egress,
        caveats: sim.caveats,
    }
}

struct Simulation<'m> {
    model: &'m ObjectModel,
    packet: &'m PacketDescriptor,
    steps: Vec<TraceStep>,
    caveats: Vec<SimulationCaveat>,
}

impl<'m> Simulation<'m> {
    fn caveat(&mut self, entity: Option<String>, message: String) {
        let caveat = SimulationCaveat { entity, message };
        if !self.caveats.contains(&caveat) {
            self.caveats.push(caveat);
        }
    }

    fn interface_name(&self, handle: Option<Handle>) -> Option<String> {
        handle
            .and_then(|h| self.model.name_of(h))
            .map(str::to_string)
    }

    fn zone_name(&self, handle: Option<Handle>) -> Option<String> {
        handle
            .and_then(|h| self.model.zone_of(h))
            .map(|z| z.name.clone())
    }

    fn run(&mut self) -> (Disposition, Option<String>) {
        let ingress = self.ingress();

        let prerouting = self.prerouting_vip(ingress);
        let lookup = prerouting.map_or(self.packet.dst, |(_, mapped)| mapped);
        let Some(route) = lookup_route(self.model, lookup) else {
            let mut step = TraceStep::new(StepKind::Route, None).with("lookup", lookup);
            if let Some((vip, _)) = prerouting {
                step = step.with("vip", &vip.name);
            }
            self.steps.push(step.with("result", "no route"));
            return (Disposition::NoRoute, None);
        };

        let mut step = TraceStep::new(StepKind::Route, Some(route.name.clone()))
            .with("destination", route.destination)
            .with("distance", route.distance);
        if let Some(gateway) = route.gateway {
            step = step.with("gateway", gateway);
        }
        if let Some(name) = &route.egress_name {
            step = step.with("interface", name);
        }
        if let Some((vip, mapped)) = prerouting {
            step = step.with("lookup", mapped).with("vip", &vip.name);
        }
        if route.blackhole {
            self.steps.push(step.with("blackhole", "true"));
            return (Disposition::NoRoute, None);
        }
        self.steps.push(step);

        let Some(egress) = route.egress else {
            self.caveat(
                Some(route.name.clone()),
                format!("{} has no resolvable egress interface", route.name),
            );
            return (Disposition::NoRoute, None);
        };

        let Some(policy) = self.match_policy(ingress, egress) else {
            return self.no_policy(ingress, egress);
        };

        let mut step = TraceStep::new(StepKind::Policy, Some(policy.label()))
            .with("id", policy.id)
            .with("action", if policy.permits() { "accept" } else { "deny" });
        if let Some(comments) = &policy.comments {
            step = step.with("comments", comments);
        }
        self.steps.push(step);
        if !policy.permits() {
            return (Disposition::DenyExplicit, None);
        }

        self.apply_nat(policy, ingress, egress, prerouting.map(|(vip, _)| vip));
        (Disposition::Permit, self.interface_name(Some(egress)))
    }

    /// Resolve or infer the ingress interface and record the step.
    fn ingress(&mut self) -> Option<Handle> {
        let model = self.model;
        let packet = self.packet;
        let (handle, source) = match packet.ingress.as_deref() {
            Some(name) => match model.lookup(ObjectKind::Interface, name) {
                Some(handle) => (Some(handle), "given"),
                None => {
                    self.caveat(
                        Some(name.to_string()),
                        format!("ingress interface `{name}` is not defined; only `any` matches the source interface"),
                    );
                    (None, "given")
                }
            },
            None => {
                if let Some(handle) = connected_interface(model, packet.src) {
                    (Some(handle), "connected")
                } else if let Some(handle) = lookup_route(model, packet.src)
                    .filter(|r| !r.blackhole)
                    .and_then(|r| r.egress)
                {
                    (Some(handle), "route")
                } else {
                    self.caveat(
                        None,
                        format!(
                            "no interface leads to source {}; only `any` matches the source interface",
                            packet.src
                        ),
                    );
                    (None, "none")
                }
            }
        };

        let mut step = TraceStep::new(StepKind::Ingress, self.interface_name(handle))
            .with("source", source);
        if let Some(zone) = self.zone_name(handle) {
            step = step.with("zone", zone);
        }
        self.steps.push(step);
        handle
    }

    /// First VIP whose external side the packet hits; the route lookup then
    /// uses the mapped address.
    fn prerouting_vip(&self, ingress: Option<Handle>) -> Option<(&'m Vip, Ipv4Addr)> {
        let packet = self.packet;
        self.model.vips().iter().find_map(|vip| {
            let (ext, mapped) = (vip.ext_ip?, vip.mapped_ip?);
            vip_matches(
                self.model,
                vip,
                packet.dst,
                packet.protocol,
                packet.port,
                ingress,
            )
            .then(|| (vip, ext.translate(packet.dst, &mapped)))
        })
    }

    fn match_policy(&mut self, ingress: Option<Handle>, egress: Handle) -> Option<&'m Policy> {
        let model = self.model;
        for policy in model.policies() {
            if !policy.enabled {
                trace!(policy = %policy.name, "skipping disabled policy");
                continue;
            }
            if !interface_matches(model, &policy.srcintf, ingress)
                || !interface_matches(model, &policy.dstintf, Some(egress))
            {
                trace!(policy = %policy.name, "interfaces do not match");
                continue;
            }
            let packet = self.packet;
            // Every field is evaluated so caveats do not depend on field order.
            let src = self.address_field(
                policy,
                "srcaddr",
                &policy.srcaddr,
                policy.srcaddr_negate,
                packet.src,
                ingress,
            );
            let dst = self.address_field(
                policy,
                "dstaddr",
                &policy.dstaddr,
                policy.dstaddr_negate,
                packet.dst,
                ingress,
            );
            let service = self.service_field(policy);
            let matched = src && dst && service;
            trace!(policy = %policy.name, matched, "policy evaluated");
            if matched {
                if policy.schedule != "always" {
                    self.caveat(
                        Some(format!("policy {}", policy.label())),
                        format!(
                            "schedule `{}` is not evaluated; assumed active",
                            policy.schedule
                        ),
                    );
                }
                return Some(policy);
            }
        }
        None
    }

    fn address_field(
        &mut self,
        policy: &Policy,
        field: &str,
        refs: &[Reference],
        negate: bool,
        ip: Ipv4Addr,
        ingress: Option<Handle>,
    ) -> bool {
        let model = self.model;
        let label = format!("policy {}", policy.label());
        if refs.is_empty() {
            self.caveat(Some(label), format!("{field} is empty and matches nothing"));
            return false;
        }
        let flat = flatten_addresses(model, refs);
        for name in &flat.unresolved {
            self.caveat(
                Some(label.clone()),
                format!("{field} references unresolved `{name}`, which matches nothing"),
            );
        }
        for name in &flat.empty_groups {
            self.caveat(
                Some(label.clone()),
                format!("{field} group `{name}` expands to nothing"),
            );
        }

        let mut hit = flat.any;
        if !hit {
            for leaf in &flat.leaves {
                let matched = match leaf.kind {
                    ObjectKind::Vip => model.vip(*leaf).is_some_and(|vip| {
                        vip_matches(model, vip, ip, self.packet.protocol, self.packet.port, ingress)
                    }),
                    _ => match model.address(*leaf).map(|a| (a, address_contains(a, ip))) {
                        Some((_, Some(matched))) => matched,
                        Some((address, None)) => {
                            self.caveat(
                                Some(label.clone()),
                                format!(
                                    "{field} member `{}` cannot be evaluated offline; treated as no match",
                                    address.name
                                ),
                            );
                            false
                        }
                        None => false,
                    },
                };
                if matched {
                    hit = true;
                    break;
                }
            }
        }
        hit != negate
    }

    fn service_field(&mut self, policy: &Policy) -> bool {
        let model = self.model;
        let label = format!("policy {}", policy.label());
        if policy.service.is_empty() {
            self.caveat(Some(label), "service is empty and matches nothing".to_string());
            return false;
        }
        let flat = flatten_services(model, &policy.service);
        for name in &flat.unresolved {
            self.caveat(
                Some(label.clone()),
                format!("service references unresolved `{name}`, which matches nothing"),
            );
        }
        for name in &flat.empty_groups {
            self.caveat(
                Some(label.clone()),
                format!("service group `{name}` expands to nothing"),
            );
        }

        let mut hit = flat.any;
        if !hit {
            for service in flat.leaves.iter().filter_map(|h| model.service(*h)) {
                match service_matches(service, self.packet.protocol, self.packet.port) {
                    Some(true) => {
                        hit = true;
                        break;
                    }
                    Some(false) => {}
                    None => self.caveat(
                        Some(label.clone()),
                        format!(
                            "service `{}` cannot be evaluated offline; treated as no match",
                            service.name
                        ),
                    ),
                }
            }
        }
        hit != policy.service_negate
    }

    /// No policy matched. Intra-zone traffic is still allowed when the zone says so.
    fn no_policy(&mut self, ingress: Option<Handle>, egress: Handle) -> (Disposition, Option<String>) {
        let model = self.model;
        let same_zone = ingress
            .and_then(|i| model.interface(i))
            .and_then(|i| i.zone)
            .filter(|z| model.interface(egress).and_then(|e| e.zone) == Some(*z))
            .and_then(|z| model.zone(z));
        if let Some(zone) = same_zone.filter(|z| z.intrazone_allow) {
            self.steps.push(
                TraceStep::new(StepKind::Policy, None)
                    .with("intrazone", "allow")
                    .with("zone", &zone.name),
            );
            self.push_egress(egress, self.packet.src, self.packet.dst, None);
            return (Disposition::Permit, self.interface_name(Some(egress)));
        }
        self.steps
            .push(TraceStep::new(StepKind::Policy, None).with("result", "no matching policy"));
        (Disposition::DenyImplicit, None)
    }

    fn apply_nat(
        &mut self,
        policy: &'m Policy,
        ingress: Option<Handle>,
        egress: Handle,
        prerouting: Option<&'m Vip>,
    ) {
        let model = self.model;
        let packet = self.packet;
        let label = format!("policy {}", policy.label());

        let dnat = flatten_addresses(model, &policy.dstaddr)
            .leaves
            .iter()
            .filter(|h| h.kind == ObjectKind::Vip)
            .filter_map(|h| model.vip(*h))
            .find(|vip| vip_matches(model, vip, packet.dst, packet.protocol, packet.port, ingress));
        if let Some(vip) = prerouting.filter(|v| dnat.map_or(true, |d| d.name != v.name)) {
            self.caveat(
                Some(label.clone()),
                format!(
                    "destination matches VIP `{}` but the policy does not reference it; the route was looked up toward the mapped address",
                    vip.name
                ),
            );
        }

        let mut step = TraceStep::new(StepKind::Nat, None);
        let mut dst = packet.dst;
        let mut port = None;
        if let Some(vip) = dnat {
            if let (Some(ext), Some(mapped)) = (vip.ext_ip, vip.mapped_ip) {
                dst = ext.translate(packet.dst, &mapped);
            }
            if vip.port_forward {
                if let (Some(ext), Some(mapped), Some(p)) = (vip.ext_port, vip.mapped_port, packet.port) {
                    port = Some(ext.translate(p, &mapped));
                }
            }
            step.matched = Some(vip.name.clone());
            step = step.with("dnat", dst);
            if let Some(port) = port {
                step = step.with("dnat_port", port);
            }
        }

        let mut src = packet.src;
        if let Some((address, source)) = self.source_nat(policy, ingress, egress) {
            src = address;
            if step.matched.is_none() {
                step.matched = Some(source.clone());
            }
            step = step.with("snat", address).with("snat_source", source);
        }

        if !step.detail.is_empty() {
            self.steps.push(step);
        }
        self.push_egress(egress, src, dst, port);
    }

    /// Source translation for a permitted packet, with a label for where it came from.
    fn source_nat(
        &mut self,
        policy: &Policy,
        ingress: Option<Handle>,
        egress: Handle,
    ) -> Option<(Ipv4Addr, String)> {
        let model = self.model;
        let interface_ip = model
            .interface(egress)
            .and_then(|i| i.address)
            .map(|net| (net.ip(), "interface".to_string()));

        if model.central_nat() {
            let packet = self.packet;
            let rule = model.central_snat_rules().iter().find(|rule| {
                rule.enabled
                    && interface_matches(model, &rule.srcintf, ingress)
                    && interface_matches(model, &rule.dstintf, Some(egress))
                    && self.plain_address_match(&rule.orig_addr, packet.src)
                    && self.plain_address_match(&rule.dst_addr, packet.dst)
            })?;
            if !rule.nat {
                return None;
            }
            let source = format!("central-snat:{}", rule.name);
            return match first_pool(model, &rule.nat_ippool) {
                Some((_, start)) => Some((start, source)),
                None => interface_ip.map(|(ip, _)| (ip, source)),
            };
        }

        if !policy.nat {
            return None;
        }
        if policy.ippool {
            if let Some((name, start)) = first_pool(model, &policy.poolname) {
                return Some((start, format!("ippool:{name}")));
            }
        }
        if interface_ip.is_none() {
            self.caveat(
                Some(format!("policy {}", policy.label())),
                "source NAT requested but the egress interface has no address".to_string(),
            );
        }
        interface_ip
    }

    /// Address match without caveats, for central SNAT rule selection.
    fn plain_address_match(&self, refs: &[Reference], ip: Ipv4Addr) -> bool {
        let flat = flatten_addresses(self.model, refs);
        flat.any
            || flat.leaves.iter().any(|h| {
                self.model
                    .address(*h)
                    .and_then(|a| address_contains(a, ip))
                    .unwrap_or(false)
            })
    }

    fn push_egress(&mut self, egress: Handle, src: Ipv4Addr, dst: Ipv4Addr, port: Option<u16>) {
        let mut step = TraceStep::new(StepKind::Egress, self.interface_name(Some(egress)))
            .with("src", src)
            .with("dst", dst);
        if let Some(port) = port.or(self.packet.port) {
            step = step.with("port", port);
        }
        if let Some(zone) = self.zone_name(Some(egress)) {
            step = step.with("zone", zone);
        }
        self.steps.push(step);
    }
}

/// Name and start address of the first resolved pool with a range, in list order.
fn first_pool<'m>(model: &'m ObjectModel, pools: &[Reference]) -> Option<(&'m str, Ipv4Addr)> {
    pools
        .iter()
        .filter_map(|r| match r.target {
            Target::Object(h) => model.ip_pool(h),
            Target::Any | Target::Unresolved => None,
        })
        .find_map(|pool| pool.range.map(|r| (pool.name.as_str(), r.start)))
}

pub fn render_trace_text(trace: &Trace) -> String {
    let mut out = Vec::new();
    out.push(format!("trace {}", trace.packet));
    for (i, step) in trace.steps.iter().enumerate() {
        let detail = step
            .detail
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push(
            format!(
                "{:>2}. {:<8}{} {detail}",
                i + 1,
                step.kind.to_string(),
                step.matched.as_deref().unwrap_or("-")
            )
            .trim_end()
            .to_string(),
        );
    }
    let disposition = match trace.disposition {
        Disposition::Permit => trace.disposition.to_string().green(),
        Disposition::NoRoute => trace.disposition.to_string().yellow(),
        Disposition::DenyImplicit | Disposition::DenyExplicit => {
            trace.disposition.to_string().red()
        }
    };
    out.push(format!(
        "disposition={disposition} egress={}",
        trace.egress_interface.as_deref().unwrap_or("none")
    ));
    if !trace.caveats.is_empty() {
        out.push("caveats".to_string());
        for caveat in &trace.caveats {
            match &caveat.entity {
                Some(entity) => out.push(format!("- [{entity}] {}", caveat.message)),
                None => out.push(format!("- {}", caveat.message)),
            }
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::{lookup_route, simulate, Disposition, SimulationCaveat, StepKind};
    use crate::load::{load_config, LoadOptions};
    use crate::model::ObjectModel;
    use crate::packet::{PacketDescriptor, Protocol};

    const BASIC: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../fixtures/fortigate-basic.conf"
    ));

    fn basic() -> ObjectModel {
        load_config(BASIC, &LoadOptions::default())
            .expect("fixture loads")
            .model
    }

    fn tcp(src: [u8; 4], dst: [u8; 4], port: u16) -> PacketDescriptor {
        PacketDescriptor::new(Ipv4Addr::from(src), Ipv4Addr::from(dst), Protocol::Tcp).with_port(port)
    }

    fn detail<'t>(trace: &'t super::Trace, kind: StepKind, key: &str) -> Option<&'t str> {
        trace
            .step(kind)
            .and_then(|s| s.detail.get(key))
            .map(String::as_str)
    }

    #[test]
    fn outbound_web_hits_first_policy_with_interface_snat() {
        let model = basic();
        let trace = simulate(&model, &tcp([192, 168, 10, 25], [93, 184, 216, 34], 443));

        assert_eq!(trace.disposition, Disposition::Permit);
        assert_eq!(trace.egress_interface.as_deref(), Some("port1"));
        let kinds: Vec<StepKind> = trace.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                StepKind::Ingress,
                StepKind::Route,
                StepKind::Policy,
                StepKind::Nat,
                StepKind::Egress
            ]
        );
        assert_eq!(
            trace.step(StepKind::Ingress).and_then(|s| s.matched.as_deref()),
            Some("port2")
        );
        assert_eq!(detail(&trace, StepKind::Ingress, "zone"), Some("internal"));
        assert_eq!(
            trace.step(StepKind::Route).and_then(|s| s.matched.as_deref()),
            Some("static 1")
        );
        // Policy 2 would also match; the first match wins.
        assert_eq!(
            trace.step(StepKind::Policy).and_then(|s| s.matched.as_deref()),
            Some("1 (lan-web-out)")
        );
        assert_eq!(detail(&trace, StepKind::Nat, "snat"), Some("203.0.113.2"));
        assert_eq!(detail(&trace, StepKind::Nat, "snat_source"), Some("interface"));
        assert!(trace.caveats.is_empty());
    }

    #[test]
    fn simulation_is_deterministic() {
        let model = basic();
        let packet = tcp([192, 168, 10, 25], [93, 184, 216, 34], 22);
        assert_eq!(simulate(&model, &packet), simulate(&model, &packet));
    }

    #[test]
    fn longest_prefix_then_distance_selects_route() {
        let model = basic();
        let route = lookup_route(&model, Ipv4Addr::new(10, 0, 1, 5)).expect("route");
        assert_eq!(route.name, "static 3");
        assert_eq!(route.egress_name.as_deref(), Some("port4"));

        let route = lookup_route(&model, Ipv4Addr::new(10, 7, 0, 1)).expect("route");
        assert_eq!(route.name, "static 2");

        let route = lookup_route(&model, Ipv4Addr::new(10, 10, 30, 9)).expect("route");
        assert_eq!(route.name, "connected port4");
    }

    #[test]
    fn traffic_within_a_zone_without_policy_is_implicitly_denied() {
        let model = basic();
        let trace = simulate(&model, &tcp([192, 168, 10, 25], [10, 0, 1, 5], 443));
        assert_eq!(trace.disposition, Disposition::DenyImplicit);
        assert_eq!(trace.egress_interface, None);
        assert_eq!(
            trace.step(StepKind::Policy).and_then(|s| s.matched.as_deref()),
            None
        );
    }

    #[test]
    fn disabled_policy_is_never_matched_and_unresolved_names_leave_caveats() {
        let model = basic();
        let trace = simulate(&model, &tcp([192, 168, 10, 25], [93, 184, 216, 34], 22));
        assert_eq!(trace.disposition, Disposition::DenyImplicit);
        assert!(trace
            .caveats
            .iter()
            .any(|c| c.entity.as_deref() == Some("policy 8 (legacy-http)")
                && c.message.contains("missing-net")));
    }

    #[test]
    fn vip_rewrites_destination_and_port() {
        let model = basic();
        let packet = tcp([198, 51, 100, 7], [203, 0, 113, 10], 443).with_ingress("port1");
        let trace = simulate(&model, &packet);
        assert_eq!(trace.disposition, Disposition::Permit);
        assert_eq!(trace.egress_interface.as_deref(), Some("port3"));
        assert_eq!(
            trace.step(StepKind::Route).and_then(|s| s.matched.as_deref()),
            Some("connected port3")
        );
        assert_eq!(detail(&trace, StepKind::Route, "vip"), Some("web-vip"));
        assert_eq!(
            trace.step(StepKind::Policy).and_then(|s| s.matched.as_deref()),
            Some("3 (publish-web)")
        );
        assert_eq!(detail(&trace, StepKind::Nat, "dnat"), Some("172.16.20.10"));
        assert_eq!(detail(&trace, StepKind::Nat, "dnat_port"), Some("8443"));
        assert_eq!(detail(&trace, StepKind::Egress, "dst"), Some("172.16.20.10"));
    }

    #[test]
    fn blackhole_route_ends_the_trace() {
        let model = basic();
        let trace = simulate(&model, &tcp([192, 168, 10, 25], [10, 50, 3, 4], 443));
        assert_eq!(trace.disposition, Disposition::NoRoute);
        assert_eq!(detail(&trace, StepKind::Route, "blackhole"), Some("true"));
        assert!(trace.step(StepKind::Policy).is_none());
    }

    #[test]
    fn explicit_deny_and_missing_route() {
        let text = r#"config system interface
edit port1
set ip 10.1.0.1 255.255.255.0
next
edit port2
set ip 10.2.0.1 255.255.255.0
next
end
config firewall policy
edit 9
set srcintf port1
set dstintf port2
set srcaddr all
set dstaddr all
set service ALL
set action accept
set status disable
next
edit 10
set srcintf port1
set dstintf port2
set srcaddr all
set dstaddr all
set service ALL
next
end
"#;
        let model = load_config(text, &LoadOptions::default()).expect("load").model;
        let trace = simulate(&model, &tcp([10, 1, 0, 5], [10, 2, 0, 5], 80));
        assert_eq!(trace.disposition, Disposition::DenyExplicit);
        assert_eq!(
            trace.step(StepKind::Policy).and_then(|s| s.matched.as_deref()),
            Some("10")
        );

        let trace = simulate(&model, &tcp([10, 1, 0, 5], [192, 0, 2, 1], 80));
        assert_eq!(trace.disposition, Disposition::NoRoute);
    }

    const NAT_LAB: &str = r#"config system interface
edit port1
set ip 10.1.0.1 255.255.255.0
next
edit port2
set ip 203.0.113.1 255.255.255.0
next
end
config router static
edit 1
set gateway 203.0.113.254
set device port2
next
edit 2
set gateway 203.0.113.253
set device port2
next
end
config firewall ippool
edit "unranged"
next
edit "p2"
set startip 198.51.100.20
set endip 198.51.100.29
next
edit "p1"
set startip 198.51.100.10
set endip 198.51.100.19
next
end
config firewall policy
edit 1
set srcintf port1
set dstintf port2
set srcaddr all
set dstaddr all
set service ALL
set action accept
set nat enable
set ippool enable
set poolname "ghost" "unranged" "p2" "p1"
next
end
"#;

    #[test]
    fn equal_routes_resolve_to_the_first_declared() {
        let model = load_config(NAT_LAB, &LoadOptions::default()).expect("load").model;
        let route = lookup_route(&model, Ipv4Addr::new(8, 8, 8, 8)).expect("route");
        assert_eq!(route.name, "static 1");
        assert_eq!(route.gateway, Some(Ipv4Addr::new(203, 0, 113, 254)));
    }

    #[test]
    fn first_usable_pool_in_poolname_order_wins() {
        let model = load_config(NAT_LAB, &LoadOptions::default()).expect("load").model;
        let trace = simulate(&model, &tcp([10, 1, 0, 5], [8, 8, 8, 8], 53));
        assert_eq!(trace.disposition, Disposition::Permit);
        assert_eq!(detail(&trace, StepKind::Nat, "snat"), Some("198.51.100.20"));
        assert_eq!(detail(&trace, StepKind::Nat, "snat_source"), Some("ippool:p2"));
    }

    #[test]
    fn central_snat_takes_precedence_over_policy_pools() {
        let text = format!(
            "{NAT_LAB}config system settings\nset central-nat enable\nend\nconfig firewall central-snat-map\nedit 1\nset srcintf port1\nset dstintf port2\nset orig-addr all\nset dst-addr all\nset nat-ippool p1\nnext\nend\n"
        );
        let model = load_config(&text, &LoadOptions::default()).expect("load").model;
        let trace = simulate(&model, &tcp([10, 1, 0, 5], [8, 8, 8, 8], 53));
        assert_eq!(detail(&trace, StepKind::Nat, "snat"), Some("198.51.100.10"));
        assert_eq!(
            detail(&trace, StepKind::Nat, "snat_source"),
            Some("central-snat:1")
        );
    }

    #[test]
    fn empty_address_field_matches_nothing_and_leaves_a_caveat() {
        let text = r#"config system interface
edit port1
set ip 10.1.0.1 255.255.255.0
next
edit port2
set ip 10.2.0.1 255.255.255.0
next
end
config firewall policy
edit 4
set srcintf port1
set dstintf port2
set dstaddr all
set service ALL
set action accept
next
end
"#;
        let model = load_config(text, &LoadOptions::default()).expect("load").model;
        let trace = simulate(&model, &tcp([10, 1, 0, 5], [10, 2, 0, 5], 80));
        assert_eq!(trace.disposition, Disposition::DenyImplicit);
        assert!(trace.caveats.iter().any(|c| c.entity.as_deref() == Some("policy 4")
            && c.message == "srcaddr is empty and matches nothing"));
    }

    #[test]
    fn non_default_schedule_is_assumed_active_with_a_caveat() {
        let text = r#"config system interface
edit port1
set ip 10.1.0.1 255.255.255.0
next
edit port2
set ip 10.2.0.1 255.255.255.0
next
end
config firewall policy
edit 6
set srcintf port1
set dstintf port2
set srcaddr all
set dstaddr all
set service ALL
set schedule "business-hours"
set action accept
next
end
"#;
        let model = load_config(text, &LoadOptions::default()).expect("load").model;
        let trace = simulate(&model, &tcp([10, 1, 0, 5], [10, 2, 0, 5], 443));
        assert_eq!(trace.disposition, Disposition::Permit);
        assert!(trace.caveats.contains(&SimulationCaveat {
            entity: Some("policy 6".to_string()),
            message: "schedule `business-hours` is not evaluated; assumed active".to_string(),
        }));
    }
}
