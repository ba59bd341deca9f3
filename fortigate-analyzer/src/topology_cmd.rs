use std::fs;

use anyhow::{Context, Result};
use fortigate_analyzer::connectivity::{build_connectivity_tree, render_connectivity_tree};
use fortigate_analyzer::export::{render_dot, write_graphml};
use fortigate_analyzer::topology::build_topology;

use crate::cli::{TopologyArgs, TopologyFormat};
use crate::load_input;
use crate::path_guard::ensure_output_not_same;

pub fn run_topology(args: TopologyArgs, vdom: Option<&str>) -> Result<()> {
    let loaded = load_input(&args.file, vdom)?;
    let include_blocked = !args.no_blocked;

    let rendered = match args.format {
        TopologyFormat::Json => {
            let mut graph = build_topology(&loaded.model);
            if !include_blocked {
                graph.blocked.clear();
            }
            serde_json::to_string_pretty(&graph)?
        }
        TopologyFormat::Dot => render_dot(&build_topology(&loaded.model), include_blocked),
        TopologyFormat::Graphml => write_graphml(&build_topology(&loaded.model), include_blocked)
            .context("failed to render GraphML")?,
        TopologyFormat::Tree => render_connectivity_tree(&build_connectivity_tree(&loaded.model)),
    };

    match args.output {
        Some(path) => {
            ensure_output_not_same(&path, &[&args.file])?;
            fs::write(&path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
