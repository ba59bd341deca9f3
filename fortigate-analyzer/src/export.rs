use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::topology::{Edge, EdgeStyle, GraphDescription, NodeKind};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write GraphML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to write GraphML: {0}")]
    Io(#[from] std::io::Error),
    #[error("GraphML output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn dot_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn dot_id(raw: &str) -> String {
    format!("\"{}\"", dot_escape(raw))
}

/// Graphviz DOT text. Zones become clusters labelled with their member interfaces.
pub fn render_dot(graph: &GraphDescription, include_blocked: bool) -> String {
    let mut out = vec![
        "digraph topology {".to_string(),
        "  rankdir=LR;".to_string(),
        "  node [fontname=\"Helvetica\"];".to_string(),
    ];

    for node in &graph.nodes {
        let shape = match node.kind {
            NodeKind::Zone => "box",
            NodeKind::Interface => "ellipse",
            NodeKind::Any => "diamond",
        };
        let cluster = graph.clusters.iter().find(|c| c.zone == node.id);
        match cluster {
            Some(cluster) => {
                out.push(format!("  subgraph {} {{", dot_id(&format!("cluster_{}", node.id))));
                out.push(format!(
                    "    label={};",
                    dot_id(&format!("{} [{}]", node.id, cluster.interfaces.join(", ")))
                ));
                out.push(format!(
                    "    {} [label={}, shape={shape}];",
                    dot_id(&node.id),
                    dot_id(&node.label)
                ));
                out.push("  }".to_string());
            }
            None => out.push(format!(
                "  {} [label={}, shape={shape}];",
                dot_id(&node.id),
                dot_id(&node.label)
            )),
        }
    }

    let blocked: &[Edge] = if include_blocked { &graph.blocked } else { &[] };
    for edge in graph.edges.iter().chain(blocked) {
        let style = match edge.style {
            EdgeStyle::Permit => "style=solid, color=\"darkgreen\"",
            EdgeStyle::Blocked => "style=dashed, color=\"red\"",
        };
        out.push(format!(
            "  {} -> {} [label={}, {style}];",
            dot_id(&edge.from),
            dot_id(&edge.to),
            dot_id(&edge.label)
        ));
    }
    out.push("}".to_string());
    out.join("\n")
}

/// GraphML document with `kind`, `label`, `style` and `policies` data keys.
pub fn write_graphml(graph: &GraphDescription, include_blocked: bool) -> Result<String, ExportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("graphml");
    root.push_attribute(("xmlns", "http://graphml.graphdrawing.org/xmlns"));
    writer.write_event(Event::Start(root))?;

    for (id, target, name) in [
        ("d_kind", "node", "kind"),
        ("d_label", "node", "label"),
        ("d_cluster", "node", "cluster"),
        ("e_label", "edge", "label"),
        ("e_style", "edge", "style"),
        ("e_policies", "edge", "policies"),
    ] {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", id));
        key.push_attribute(("for", target));
        key.push_attribute(("attr.name", name));
        key.push_attribute(("attr.type", "string"));
        writer.write_event(Event::Empty(key))?;
    }

    let mut g = BytesStart::new("graph");
    g.push_attribute(("id", "topology"));
    g.push_attribute(("edgedefault", "directed"));
    writer.write_event(Event::Start(g))?;

    for node in &graph.nodes {
        let mut start = BytesStart::new("node");
        start.push_attribute(("id", node.id.as_str()));
        writer.write_event(Event::Start(start))?;
        let kind = match node.kind {
            NodeKind::Zone => "zone",
            NodeKind::Interface => "interface",
            NodeKind::Any => "any",
        };
        write_data(&mut writer, "d_kind", kind)?;
        write_data(&mut writer, "d_label", &node.label)?;
        if let Some(cluster) = graph.clusters.iter().find(|c| c.zone == node.id) {
            write_data(&mut writer, "d_cluster", &cluster.interfaces.join(","))?;
        }
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    let blocked: &[Edge] = if include_blocked { &graph.blocked } else { &[] };
    for (i, edge) in graph.edges.iter().chain(blocked).enumerate() {
        let id = format!("e{i}");
        let mut start = BytesStart::new("edge");
        start.push_attribute(("id", id.as_str()));
        start.push_attribute(("source", edge.from.as_str()));
        start.push_attribute(("target", edge.to.as_str()));
        writer.write_event(Event::Start(start))?;
        write_data(&mut writer, "e_label", &edge.label)?;
        let style = match edge.style {
            EdgeStyle::Permit => "permit",
            EdgeStyle::Blocked => "blocked",
        };
        write_data(&mut writer, "e_style", style)?;
        let policies = edge
            .policies
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write_data(&mut writer, "e_policies", &policies)?;
        writer.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new("data");
    start.push_attribute(("key", key));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{render_dot, write_graphml};
    use crate::topology::{Cluster, Edge, EdgeStyle, GraphDescription, Node, NodeKind};

    fn sample() -> GraphDescription {
        GraphDescription {
            nodes: vec![
                Node {
                    id: "lan".to_string(),
                    kind: NodeKind::Zone,
                    label: "lan".to_string(),
                },
                Node {
                    id: "wan1".to_string(),
                    kind: NodeKind::Interface,
                    label: "wan1\n198.51.100.2/30".to_string(),
                },
            ],
            edges: vec![Edge {
                from: "lan".to_string(),
                to: "wan1".to_string(),
                style: EdgeStyle::Permit,
                policies: vec![1, 4],
                label: "2 policies: 1, 4".to_string(),
            }],
            blocked: vec![Edge {
                from: "wan1".to_string(),
                to: "lan".to_string(),
                style: EdgeStyle::Blocked,
                policies: vec![9],
                label: "1 policy: 9".to_string(),
            }],
            clusters: vec![Cluster {
                zone: "lan".to_string(),
                interfaces: vec!["port2".to_string(), "port3".to_string()],
            }],
        }
    }

    #[test]
    fn dot_marks_blocked_edges_dashed() {
        let dot = render_dot(&sample(), true);
        assert!(dot.starts_with("digraph topology {"));
        assert!(dot.contains("subgraph \"cluster_lan\""));
        assert!(dot.contains("label=\"lan [port2, port3]\""));
        assert!(dot.contains("\"wan1\" [label=\"wan1\\n198.51.100.2/30\", shape=ellipse];"));
        assert!(dot.contains("\"lan\" -> \"wan1\" [label=\"2 policies: 1, 4\", style=solid"));
        assert!(dot.contains("\"wan1\" -> \"lan\" [label=\"1 policy: 9\", style=dashed"));
        assert!(!render_dot(&sample(), false).contains("style=dashed"));
    }

    #[test]
    fn graphml_lists_nodes_and_edges() {
        let xml = write_graphml(&sample(), false).expect("graphml");
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<node id=\"lan\">"));
        assert!(xml.contains("<edge id=\"e0\" source=\"lan\" target=\"wan1\">"));
        assert!(xml.contains("<data key=\"e_policies\">1,4</data>"));
        assert!(xml.contains("<data key=\"d_cluster\">port2,port3</data>"));
        assert!(!xml.contains("blocked"));
    }
}
