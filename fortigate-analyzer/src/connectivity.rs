use serde::Serialize;

use crate::model::{Handle, Interface, ObjectKind, ObjectModel, Policy, Reference, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The node is on the policy's source side.
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyLink {
    pub id: u32,
    pub label: String,
    pub direction: Direction,
    /// Names on the other side of the policy.
    pub peers: Vec<String>,
    pub action: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceLeaf {
    pub name: String,
    pub address: Option<String>,
    pub role: Option<String>,
    pub status: String,
    pub kind: String,
    pub policies: Vec<PolicyLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneBranch {
    pub name: String,
    pub intrazone_allow: bool,
    pub interfaces: Vec<InterfaceLeaf>,
    pub policies: Vec<PolicyLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityTree {
    pub zones: Vec<ZoneBranch>,
    pub unzoned: Vec<InterfaceLeaf>,
}

fn names(refs: &[Reference]) -> Vec<String> {
    refs.iter().map(|r| r.name.clone()).collect()
}

/// Policies that name `handle` directly on either side, in policy order.
fn links_for(model: &ObjectModel, handle: Handle) -> Vec<PolicyLink> {
    let names_target = |refs: &[Reference]| refs.iter().any(|r| r.target == Target::Object(handle));
    model
        .policies()
        .iter()
        .flat_map(|policy| {
            let outbound = names_target(&policy.srcintf)
                .then(|| link(policy, Direction::Outbound, &policy.dstintf));
            let inbound = names_target(&policy.dstintf)
                .then(|| link(policy, Direction::Inbound, &policy.srcintf));
            outbound.into_iter().chain(inbound)
        })
        .collect()
}

fn link(policy: &Policy, direction: Direction, peers: &[Reference]) -> PolicyLink {
    PolicyLink {
        id: policy.id,
        label: policy.label(),
        direction,
        peers: names(peers),
        action: if policy.permits() { "accept" } else { "deny" }.to_string(),
        enabled: policy.enabled,
    }
}

fn leaf(model: &ObjectModel, index: usize, iface: &Interface) -> InterfaceLeaf {
    InterfaceLeaf {
        name: iface.name.clone(),
        address: iface.address.map(|net| net.to_string()),
        role: iface.role.clone(),
        status: if iface.is_up() { "up" } else { "down" }.to_string(),
        kind: iface.kind.label().to_string(),
        policies: links_for(
            model,
            Handle {
                kind: ObjectKind::Interface,
                index,
            },
        ),
    }
}

pub fn build_connectivity_tree(model: &ObjectModel) -> ConnectivityTree {
    let zones = model
        .zones()
        .iter()
        .enumerate()
        .map(|(index, zone)| {
            let handle = Handle {
                kind: ObjectKind::Zone,
                index,
            };
            ZoneBranch {
                name: zone.name.clone(),
                intrazone_allow: zone.intrazone_allow,
                interfaces: model
                    .interfaces()
                    .iter()
                    .enumerate()
                    .filter(|(_, i)| i.zone == Some(handle))
                    .map(|(i, iface)| leaf(model, i, iface))
                    .collect(),
                policies: links_for(model, handle),
            }
        })
        .collect();
    let unzoned = model
        .interfaces()
        .iter()
        .enumerate()
        .filter(|(_, i)| i.zone.is_none())
        .map(|(i, iface)| leaf(model, i, iface))
        .collect();
    ConnectivityTree { zones, unzoned }
}

fn push_links(out: &mut Vec<String>, indent: &str, links: &[PolicyLink]) {
    for link in links {
        let arrow = match link.direction {
            Direction::Outbound => "->",
            Direction::Inbound => "<-",
        };
        let disabled = if link.enabled { "" } else { " disabled" };
        out.push(format!(
            "{indent}policy {} {arrow} {} {}{disabled}",
            link.label,
            link.peers.join(","),
            link.action
        ));
    }
}

fn push_interface(out: &mut Vec<String>, indent: &str, leaf: &InterfaceLeaf) {
    let mut line = format!("{indent}{} [{}]", leaf.name, leaf.kind);
    if let Some(address) = &leaf.address {
        line.push_str(&format!(" {address}"));
    }
    if let Some(role) = &leaf.role {
        line.push_str(&format!(" role={role}"));
    }
    line.push_str(&format!(" {}", leaf.status));
    out.push(line);
    push_links(out, &format!("{indent}  "), &leaf.policies);
}

pub fn render_connectivity_tree(tree: &ConnectivityTree) -> String {
    let mut out = Vec::new();
    for zone in &tree.zones {
        let intrazone = if zone.intrazone_allow {
            " intrazone=allow"
        } else {
            ""
        };
        out.push(format!("zone {}{intrazone}", zone.name));
        for iface in &zone.interfaces {
            push_interface(&mut out, "  ", iface);
        }
        push_links(&mut out, "  ", &zone.policies);
    }
    if !tree.unzoned.is_empty() {
        out.push("unzoned".to_string());
        for iface in &tree.unzoned {
            push_interface(&mut out, "  ", iface);
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{build_connectivity_tree, render_connectivity_tree, Direction};
    use crate::load::{load_config, LoadOptions};

    #[test]
    fn tree_groups_interfaces_under_zones() {
        let text = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../fixtures/fortigate-basic.conf"
        ));
        let model = load_config(text, &LoadOptions::default())
            .expect("load")
            .model;
        let tree = build_connectivity_tree(&model);

        let internal = tree.zones.iter().find(|z| z.name == "internal").expect("zone");
        let members: Vec<&str> = internal.interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(members, ["port2", "port4"]);
        let outbound: Vec<u32> = internal
            .policies
            .iter()
            .filter(|l| l.direction == Direction::Outbound)
            .map(|l| l.id)
            .collect();
        assert_eq!(outbound, [1, 2, 4, 5, 7, 8]);

        let port1 = tree.unzoned.iter().find(|i| i.name == "port1").expect("port1");
        assert_eq!(port1.address.as_deref(), Some("203.0.113.2/24"));

        let text = render_connectivity_tree(&tree);
        assert!(text.contains("zone dmz-zone intrazone=allow"));
        assert!(text.contains("  policy 5 (old-allow-all) -> port1 accept disabled"));
        assert!(text.contains("unzoned\n  port1 [physical] 203.0.113.2/24 role=wan up"));
    }
}
