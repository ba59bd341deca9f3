use forticonf_core::{ConfigBlock, ConfigEntry, SetOp};
use ipnetwork::Ipv4Network;

use crate::diagnostics::Diagnostic;
use crate::model::{
    references, AdminStatus, Address, AddressKind, CentralSnat, Interface, InterfaceKind, IpPool,
    LogTraffic, Policy, PolicyAction, Reference, Service, ServiceKind, StaticRoute, Vip, VipGroup,
    Zone,
};
use crate::net::{
    default_network, parse_addr, parse_port_ranges, parse_subnet, Ipv4Range, PortRange,
};
use crate::packet::Protocol;

/// Section path plus the keys the loader reads or knowingly ignores.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub path: &'static str,
    /// `None` for singleton sections with open-ended key sets (`system global`).
    pub known_keys: Option<&'static [&'static str]>,
}

const COMMON_KEYS: &[&str] = &["uuid", "comment", "comments", "color", "fabric-object"];

pub const SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        path: "system global",
        known_keys: None,
    },
    SectionSpec {
        path: "system settings",
        known_keys: None,
    },
    SectionSpec {
        path: "system interface",
        known_keys: Some(&[
            "vdom",
            "ip",
            "allowaccess",
            "type",
            "alias",
            "role",
            "status",
            "interface",
            "vlanid",
            "snmp-index",
            "description",
            "mode",
            "mtu-override",
            "mtu",
            "speed",
            "member",
            "lldp-reception",
            "lldp-transmission",
            "estimated-upstream-bandwidth",
            "estimated-downstream-bandwidth",
            "secondary-IP",
            "monitor-bandwidth",
        ]),
    },
    SectionSpec {
        path: "system zone",
        known_keys: Some(&["interface", "intrazone", "description", "tagging"]),
    },
    SectionSpec {
        path: "firewall address",
        known_keys: Some(&[
            "type",
            "subnet",
            "start-ip",
            "end-ip",
            "fqdn",
            "associated-interface",
            "country",
            "wildcard",
            "wildcard-fqdn",
            "macaddr",
            "interface",
            "sub-type",
            "allow-routing",
        ]),
    },
    SectionSpec {
        path: "firewall addrgrp",
        known_keys: Some(&["member", "allow-routing", "category"]),
    },
    SectionSpec {
        path: "firewall service custom",
        known_keys: Some(&[
            "protocol",
            "protocol-number",
            "tcp-portrange",
            "udp-portrange",
            "sctp-portrange",
            "icmptype",
            "icmpcode",
            "category",
            "proxy",
            "visibility",
            "iprange",
            "fqdn",
            "session-ttl",
            "check-reset-range",
        ]),
    },
    SectionSpec {
        path: "firewall service group",
        known_keys: Some(&["member", "proxy"]),
    },
    SectionSpec {
        path: "firewall policy",
        known_keys: Some(&[
            "name",
            "status",
            "srcintf",
            "dstintf",
            "srcaddr",
            "dstaddr",
            "srcaddr-negate",
            "dstaddr-negate",
            "service",
            "service-negate",
            "action",
            "schedule",
            "nat",
            "ippool",
            "poolname",
            "logtraffic",
            "logtraffic-start",
            "utm-status",
            "ssl-ssh-profile",
            "av-profile",
            "webfilter-profile",
            "ips-sensor",
            "application-list",
            "inspection-mode",
            "profile-protocol-options",
            "internet-service",
            "match-vip",
            "global-label",
            "traffic-shaper",
        ]),
    },
    SectionSpec {
        path: "router static",
        known_keys: Some(&[
            "status",
            "dst",
            "gateway",
            "device",
            "distance",
            "priority",
            "weight",
            "blackhole",
            "dynamic-gateway",
            "link-monitor-exempt",
            "vrf",
            "sdwan-zone",
        ]),
    },
    SectionSpec {
        path: "firewall vip",
        known_keys: Some(&[
            "type",
            "extip",
            "mappedip",
            "extintf",
            "portforward",
            "protocol",
            "extport",
            "mappedport",
            "arp-reply",
            "nat-source-vip",
        ]),
    },
    SectionSpec {
        path: "firewall vipgrp",
        known_keys: Some(&["interface", "member"]),
    },
    SectionSpec {
        path: "firewall ippool",
        known_keys: Some(&[
            "type",
            "startip",
            "endip",
            "source-startip",
            "source-endip",
            "arp-reply",
            "arp-intf",
        ]),
    },
    SectionSpec {
        path: "firewall central-snat-map",
        known_keys: Some(&[
            "status",
            "srcintf",
            "dstintf",
            "orig-addr",
            "dst-addr",
            "nat-ippool",
            "nat",
            "protocol",
            "orig-port",
            "nat-port",
            "type",
        ]),
    },
];

const SECONDARY_IP: SectionSpec = SectionSpec {
    path: "secondaryip",
    known_keys: Some(&[
        "ip",
        "allowaccess",
        "gwdetect",
        "ping-serv-status",
        "detectserver",
        "detectprotocol",
        "ha-priority",
    ]),
};

/// Nested blocks the loader reads, as (section, nested block) pairs.
const NESTED: &[(&str, &str)] = &[("system interface", SECONDARY_IP.path)];

pub fn spec_for(section: &str) -> Option<&'static SectionSpec> {
    SECTIONS.iter().find(|s| s.path == section)
}

pub fn is_modeled_nested(section: &str, nested: &str) -> bool {
    NESTED.contains(&(section, nested))
}

/// Typed field access over one `edit` entry, recording diagnostics as it goes.
pub struct FieldReader<'a> {
    section: &'a str,
    entry: &'a ConfigEntry,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> FieldReader<'a> {
    pub fn new(
        section: &'a str,
        entry: &'a ConfigEntry,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            section,
            entry,
            diagnostics,
        }
    }

    /// Report every key that is not in the section's field table.
    pub fn check_keys(&mut self, spec: &SectionSpec) {
        let Some(known) = spec.known_keys else {
            return;
        };
        for setting in &self.entry.settings {
            if known.contains(&setting.key.as_str()) || COMMON_KEYS.contains(&setting.key.as_str())
            {
                continue;
            }
            self.diagnostics.push(Diagnostic::UnknownKey {
                line: setting.line,
                section: self.section.to_string(),
                entry: self.entry.name.clone(),
                key: setting.key.clone(),
            });
        }
    }

    pub fn name(&self) -> &'a str {
        &self.entry.name
    }

    pub fn line(&self) -> usize {
        self.entry.line
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.entry.value(key).map(ToOwned::to_owned)
    }

    /// All value tokens joined with a space (comments are often unquoted words).
    pub fn joined(&self, key: &str) -> Option<String> {
        self.entry.setting(key).map(|s| s.joined())
    }

    pub fn values(&self, key: &str) -> &'a [String] {
        self.entry.values(key)
    }

    pub fn refs(&self, key: &str) -> Vec<Reference> {
        references(self.values(key))
    }

    /// `enable`/`disable` switch with a default.
    pub fn flag(&mut self, key: &str, default: bool) -> bool {
        match self.entry.value(key) {
            None => default,
            Some("enable") => true,
            Some("disable") => false,
            Some(other) => {
                let other = other.to_string();
                self.invalid(key, &other, "expected enable or disable");
                default
            }
        }
    }

    /// Parse a setting's tokens; failures are reported and yield `None`.
    pub fn parse<T>(
        &mut self,
        key: &str,
        parse: impl FnOnce(&[String]) -> Result<T, String>,
    ) -> Option<T> {
        let values = self.values(key);
        if values.is_empty() {
            return None;
        }
        match parse(values) {
            Ok(value) => Some(value),
            Err(reason) => {
                self.invalid(key, &values.join(" "), &reason);
                None
            }
        }
    }

    pub fn number<T: std::str::FromStr>(&mut self, key: &str) -> Option<T> {
        self.parse(key, |values| {
            values[0]
                .parse::<T>()
                .map_err(|_| "not a number in range".to_string())
        })
    }

    pub fn invalid(&mut self, key: &str, value: &str, reason: &str) {
        let line = self
            .entry
            .settings
            .iter()
            .find(|s| s.key == key && s.op == SetOp::Set)
            .map_or(self.entry.line, |s| s.line);
        self.diagnostics.push(Diagnostic::InvalidValue {
            line,
            section: self.section.to_string(),
            entry: self.entry.name.clone(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
    }
}

fn first(values: &[String]) -> &str {
    values.first().map_or("", String::as_str)
}

/// Read `hostname` from `config system global`.
pub fn read_hostname(block: &ConfigBlock) -> Option<String> {
    block.value("hostname").map(ToOwned::to_owned)
}

/// Read `central-nat` from `config system settings`.
pub fn read_central_nat(block: &ConfigBlock) -> bool {
    block.value("central-nat") == Some("enable")
}

pub fn read_interface(r: &mut FieldReader<'_>) -> Interface {
    let mut iface = Interface::new(r.name(), r.line());
    iface.vdom = r.text("vdom");
    iface.address = r
        .parse("ip", parse_subnet)
        .filter(|net| !net.ip().is_unspecified());
    iface.status = if r.text("status").as_deref() == Some("down") {
        AdminStatus::Down
    } else {
        AdminStatus::Up
    };
    iface.vlan_id = r.number("vlanid");
    iface.kind = match r.text("type") {
        Some(kind) => InterfaceKind::parse(&kind),
        None if iface.vlan_id.is_some() => InterfaceKind::Vlan,
        None => InterfaceKind::Physical,
    };
    iface.role = r.text("role");
    iface.alias = r.joined("alias");
    iface.parent = r.text("interface");
    iface.allow_access = r.values("allowaccess").to_vec();
    iface
}

/// Subnets from `config secondaryip` under an interface entry.
pub fn read_secondary_ips(
    entry: &ConfigEntry,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Ipv4Network> {
    let Some(block) = entry.block(SECONDARY_IP.path) else {
        return Vec::new();
    };
    let section = format!("system interface [{}] secondaryip", entry.name);
    let mut subnets = Vec::new();
    for secondary in &block.entries {
        let mut r = FieldReader::new(&section, secondary, diagnostics);
        r.check_keys(&SECONDARY_IP);
        if let Some(net) = r
            .parse("ip", parse_subnet)
            .filter(|net| !net.ip().is_unspecified())
        {
            subnets.push(net);
        }
    }
    subnets
}

pub fn read_zone(r: &mut FieldReader<'_>) -> Zone {
    Zone {
        name: r.name().to_string(),
        line: r.line(),
        members: r.refs("interface"),
        intrazone_allow: r.text("intrazone").as_deref() == Some("allow"),
    }
}

pub fn read_address(r: &mut FieldReader<'_>) -> Address {
    let kind = match r.text("type").as_deref().unwrap_or("ipmask") {
        "ipmask" | "interface-subnet" => AddressKind::Subnet(
            r.parse("subnet", parse_subnet)
                .unwrap_or_else(default_network),
        ),
        "iprange" => {
            let start = r.parse("start-ip", |v| parse_addr(first(v)));
            let end = r.parse("end-ip", |v| parse_addr(first(v)));
            match (start, end) {
                (Some(start), Some(end)) => match Ipv4Range::new(start, end) {
                    Ok(range) => AddressKind::Range(range),
                    Err(reason) => {
                        r.invalid("end-ip", &end.to_string(), &reason);
                        AddressKind::Unsupported("iprange".to_string())
                    }
                },
                _ => AddressKind::Unsupported("iprange".to_string()),
            }
        }
        "fqdn" => AddressKind::Fqdn(r.text("fqdn").unwrap_or_default()),
        other => AddressKind::Unsupported(other.to_string()),
    };
    Address {
        name: r.name().to_string(),
        line: r.line(),
        kind,
        comment: r.joined("comment"),
        associated_interface: r.text("associated-interface"),
    }
}

pub fn read_address_group(r: &mut FieldReader<'_>) -> Address {
    Address {
        name: r.name().to_string(),
        line: r.line(),
        kind: AddressKind::Group(r.refs("member")),
        comment: r.joined("comment"),
        associated_interface: None,
    }
}

pub fn read_service(r: &mut FieldReader<'_>) -> Service {
    let protocol = r
        .text("protocol")
        .unwrap_or_else(|| "TCP/UDP/SCTP".to_string());
    let kind = match protocol.as_str() {
        "TCP/UDP/SCTP" => ServiceKind::Ports {
            tcp: r
                .parse("tcp-portrange", parse_port_ranges)
                .unwrap_or_default(),
            udp: r
                .parse("udp-portrange", parse_port_ranges)
                .unwrap_or_default(),
            sctp: r
                .parse("sctp-portrange", parse_port_ranges)
                .unwrap_or_default(),
        },
        "ICMP" => ServiceKind::Icmp {
            icmp_type: r.number("icmptype"),
        },
        "IP" => ServiceKind::Ip {
            protocol: r.number("protocol-number").unwrap_or(0),
        },
        "ALL" => ServiceKind::Ip { protocol: 0 },
        other => ServiceKind::Unsupported(other.to_string()),
    };
    Service {
        name: r.name().to_string(),
        line: r.line(),
        kind,
        category: r.joined("category"),
        comment: r.joined("comment"),
    }
}

pub fn read_service_group(r: &mut FieldReader<'_>) -> Service {
    Service {
        name: r.name().to_string(),
        line: r.line(),
        kind: ServiceKind::Group(r.refs("member")),
        category: None,
        comment: r.joined("comment"),
    }
}

pub fn read_policy(r: &mut FieldReader<'_>) -> Policy {
    let id = match r.name().parse::<u32>() {
        Ok(id) => id,
        Err(_) => {
            let name = r.name().to_string();
            r.invalid("edit", &name, "policy id must be a number");
            0
        }
    };
    let mut policy = Policy::new(r.name(), id, r.line());
    policy.title = r.joined("name");
    policy.srcintf = r.refs("srcintf");
    policy.dstintf = r.refs("dstintf");
    policy.srcaddr = r.refs("srcaddr");
    policy.dstaddr = r.refs("dstaddr");
    policy.service = r.refs("service");
    policy.srcaddr_negate = r.flag("srcaddr-negate", false);
    policy.dstaddr_negate = r.flag("dstaddr-negate", false);
    policy.service_negate = r.flag("service-negate", false);
    policy.action = match r.text("action").as_deref() {
        None | Some("deny") => PolicyAction::Deny,
        Some("accept") | Some("ipsec") => PolicyAction::Accept,
        Some(other) => {
            let other = other.to_string();
            r.invalid("action", &other, "expected accept, deny or ipsec");
            PolicyAction::Deny
        }
    };
    policy.enabled = r.flag("status", true);
    policy.nat = r.flag("nat", false);
    policy.ippool = r.flag("ippool", false);
    policy.poolname = r.refs("poolname");
    policy.logtraffic = match r.text("logtraffic").as_deref() {
        None | Some("utm") => LogTraffic::Utm,
        Some("all") => LogTraffic::All,
        Some("disable") => LogTraffic::Disable,
        Some(other) => {
            let other = other.to_string();
            r.invalid("logtraffic", &other, "expected all, utm or disable");
            LogTraffic::Utm
        }
    };
    if let Some(schedule) = r.text("schedule") {
        policy.schedule = schedule;
    }
    policy.comments = r.joined("comments");
    policy
}

pub fn read_route(r: &mut FieldReader<'_>) -> StaticRoute {
    let seq = r.name().parse::<u32>().unwrap_or_default();
    StaticRoute {
        name: r.name().to_string(),
        seq,
        line: r.line(),
        dst: r.parse("dst", parse_subnet).unwrap_or_else(default_network),
        gateway: r
            .parse("gateway", |v| parse_addr(first(v)))
            .filter(|gw| !gw.is_unspecified()),
        device: r.text("device").map(Reference::named),
        distance: r.number("distance").unwrap_or(10),
        priority: r.number("priority").unwrap_or(1),
        enabled: r.flag("status", true),
        blackhole: r.flag("blackhole", false),
        comment: r.joined("comment"),
    }
}

pub fn read_vip(r: &mut FieldReader<'_>) -> Vip {
    let protocol = match r.text("protocol").as_deref() {
        None | Some("tcp") => Protocol::Tcp,
        Some("udp") => Protocol::Udp,
        Some("sctp") => Protocol::Sctp,
        Some("icmp") => Protocol::Icmp,
        Some(other) => {
            let other = other.to_string();
            r.invalid("protocol", &other, "expected tcp, udp, sctp or icmp");
            Protocol::Tcp
        }
    };
    Vip {
        name: r.name().to_string(),
        line: r.line(),
        ext_ip: r.parse("extip", |v| Ipv4Range::parse(first(v))),
        mapped_ip: r.parse("mappedip", |v| Ipv4Range::parse(first(v))),
        ext_intf: Reference::named(r.text("extintf").unwrap_or_else(|| "any".to_string())),
        port_forward: r.flag("portforward", false),
        protocol,
        ext_port: r.parse("extport", |v| PortRange::parse(first(v))),
        mapped_port: r.parse("mappedport", |v| PortRange::parse(first(v))),
        comment: r.joined("comment"),
    }
}

pub fn read_vip_group(r: &mut FieldReader<'_>) -> VipGroup {
    VipGroup {
        name: r.name().to_string(),
        line: r.line(),
        interface: Reference::named(r.text("interface").unwrap_or_else(|| "any".to_string())),
        members: r.refs("member"),
    }
}

pub fn read_ip_pool(r: &mut FieldReader<'_>) -> IpPool {
    let start = r.parse("startip", |v| parse_addr(first(v)));
    let end = r.parse("endip", |v| parse_addr(first(v)));
    let range = match (start, end) {
        (Some(start), Some(end)) => match Ipv4Range::new(start, end) {
            Ok(range) => Some(range),
            Err(reason) => {
                r.invalid("endip", &end.to_string(), &reason);
                None
            }
        },
        (Some(start), None) => Some(Ipv4Range::single(start)),
        _ => None,
    };
    IpPool {
        name: r.name().to_string(),
        line: r.line(),
        range,
        pool_type: r.text("type").unwrap_or_else(|| "overload".to_string()),
    }
}

pub fn read_central_snat(r: &mut FieldReader<'_>) -> CentralSnat {
    CentralSnat {
        name: r.name().to_string(),
        id: r.name().parse::<u32>().unwrap_or_default(),
        line: r.line(),
        enabled: r.flag("status", true),
        srcintf: r.refs("srcintf"),
        dstintf: r.refs("dstintf"),
        orig_addr: r.refs("orig-addr"),
        dst_addr: r.refs("dst-addr"),
        nat_ippool: r.refs("nat-ippool"),
        nat: r.flag("nat", true),
        comments: r.joined("comments"),
    }
}
