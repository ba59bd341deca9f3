//! Zone/interface graph derived from the policy table.
//!
//! Nodes are zones, interfaces that belong to no zone, and a synthetic `any`
//! node when some policy uses the wildcard. An edge `A -> B` exists when at
//! least one enabled accept policy leads from A to B. Pairs that only enabled
//! deny policies mention are kept apart as blocked edges. All orderings are
//! stable so identical input yields byte-identical output.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::model::{Handle, Interface, ObjectKind, ObjectModel, Reference, Target};

pub const ANY_NODE: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Zone,
    Interface,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    Permit,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
    /// Contributing policy ids, ascending.
    pub policies: Vec<u32>,
    pub label: String,
}

/// A zone drawn as a box around its member interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub zone: String,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDescription {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub blocked: Vec<Edge>,
    pub clusters: Vec<Cluster>,
}

impl GraphDescription {
    pub fn edge(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }
}

/// `2 policies: 4, 7`
pub fn edge_label(policies: &[u32]) -> String {
    let ids = policies
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match policies.len() {
        1 => format!("1 policy: {ids}"),
        n => format!("{n} policies: {ids}"),
    }
}

/// Graph node a `srcintf`/`dstintf` reference lands on.
fn endpoint(model: &ObjectModel, reference: &Reference) -> Option<String> {
    match reference.target {
        Target::Any => Some(ANY_NODE.to_string()),
        Target::Unresolved => None,
        Target::Object(handle) if handle.kind == ObjectKind::Interface => Some(
            model
                .zone_of(handle)
                .map_or_else(|| reference.name.clone(), |z| z.name.clone()),
        ),
        Target::Object(_) => Some(reference.name.clone()),
    }
}

fn interface_label(model: &ObjectModel, name: &str) -> String {
    let Some(iface) = model.find::<Interface>(name) else {
        return name.to_string();
    };
    match (&iface.address, iface.is_up()) {
        (Some(net), true) => format!("{name}\n{net}"),
        (Some(net), false) => format!("{name}\n{net} (down)"),
        (None, true) => name.to_string(),
        (None, false) => format!("{name} (down)"),
    }
}

pub fn build_topology(model: &ObjectModel) -> GraphDescription {
    let mut permit: BTreeMap<(String, String), Vec<u32>> = BTreeMap::new();
    let mut deny: BTreeMap<(String, String), Vec<u32>> = BTreeMap::new();
    let mut uses_any = false;

    for policy in model.policies().iter().filter(|p| p.enabled) {
        let sources: Vec<String> = policy.srcintf.iter().filter_map(|r| endpoint(model, r)).collect();
        let targets: Vec<String> = policy.dstintf.iter().filter_map(|r| endpoint(model, r)).collect();
        let table = if policy.permits() { &mut permit } else { &mut deny };
        for from in &sources {
            for to in &targets {
                uses_any |= from == ANY_NODE || to == ANY_NODE;
                table
                    .entry((from.clone(), to.clone()))
                    .or_default()
                    .push(policy.id);
            }
        }
    }

    let blocked = into_edges(
        deny.into_iter()
            .filter(|(pair, _)| !permit.contains_key(pair))
            .collect(),
        EdgeStyle::Blocked,
    );
    let edges = into_edges(permit, EdgeStyle::Permit);

    let mut nodes: Vec<Node> = model
        .zones()
        .iter()
        .map(|z| Node {
            id: z.name.clone(),
            kind: NodeKind::Zone,
            label: z.name.clone(),
        })
        .chain(
            model
                .interfaces()
                .iter()
                .filter(|i| i.zone.is_none())
                .map(|i| Node {
                    id: i.name.clone(),
                    kind: NodeKind::Interface,
                    label: interface_label(model, &i.name),
                }),
        )
        .collect();
    if uses_any {
        nodes.push(Node {
            id: ANY_NODE.to_string(),
            kind: NodeKind::Any,
            label: ANY_NODE.to_string(),
        });
    }
    nodes.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

    let mut clusters: Vec<Cluster> = model
        .zones()
        .iter()
        .enumerate()
        .map(|(index, zone)| {
            let handle = Handle {
                kind: ObjectKind::Zone,
                index,
            };
            Cluster {
                zone: zone.name.clone(),
                interfaces: model
                    .interfaces()
                    .iter()
                    .filter(|i| i.zone == Some(handle))
                    .map(|i| i.name.clone())
                    .collect(),
            }
        })
        .collect();
    clusters.sort_by(|a, b| a.zone.cmp(&b.zone));

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        blocked = blocked.len(),
        "topology built"
    );
    GraphDescription {
        nodes,
        edges,
        blocked,
        clusters,
    }
}

fn into_edges(table: BTreeMap<(String, String), Vec<u32>>, style: EdgeStyle) -> Vec<Edge> {
    table
        .into_iter()
        .map(|((from, to), mut policies)| {
            policies.sort_unstable();
            policies.dedup();
            Edge {
                label: edge_label(&policies),
                from,
                to,
                style,
                policies,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{build_topology, edge_label, NodeKind};
    use crate::load::{load_config, LoadOptions};

    const BASIC: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../fixtures/fortigate-basic.conf"
    ));

    #[test]
    fn edges_follow_enabled_accept_policies() {
        let model = load_config(BASIC, &LoadOptions::default())
            .expect("load")
            .model;
        let graph = build_topology(&model);

        let edges: Vec<(&str, &str, Vec<u32>)> = graph
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str(), e.policies.clone()))
            .collect();
        assert_eq!(
            edges,
            [
                ("internal", "dmz-zone", vec![4, 7]),
                ("internal", "port1", vec![1, 2, 8]),
                ("port1", "dmz-zone", vec![3]),
            ]
        );
        let blocked: Vec<(&str, &str)> = graph
            .blocked
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(blocked, [("dmz-zone", "internal")]);

        let zones: Vec<&str> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Zone)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(zones, ["dmz-zone", "internal"]);
        assert!(graph.nodes.iter().all(|n| n.id != "port2"));
        assert!(graph.nodes.iter().any(|n| n.id == "port1"));
    }

    #[test]
    fn output_is_stable_across_runs() {
        let model = load_config(BASIC, &LoadOptions::default())
            .expect("load")
            .model;
        let first = serde_json::to_string(&build_topology(&model)).expect("json");
        let second = serde_json::to_string(&build_topology(&model)).expect("json");
        assert_eq!(first, second);
    }

    #[test]
    fn disabled_policy_adds_no_edge() {
        let text = "config system interface\nedit a\nnext\nedit b\nnext\nend\nconfig firewall policy\nedit 1\nset srcintf a\nset dstintf b\nset srcaddr all\nset dstaddr all\nset service ALL\nset action accept\nset status disable\nnext\nend\n";
        let model = load_config(text, &LoadOptions::default())
            .expect("load")
            .model;
        let graph = build_topology(&model);
        assert!(graph.edges.is_empty());
        assert!(graph.blocked.is_empty());
    }

    #[test]
    fn labels_count_policies() {
        assert_eq!(edge_label(&[3]), "1 policy: 3");
        assert_eq!(edge_label(&[4, 7]), "2 policies: 4, 7");
    }
}
