use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use forticonf_core::{diff_with_options, parse_file, write, write_block, DiffEntry, DiffOptions};
use fortigate_analyzer::inspect::{render_section, render_tree};
use fortigate_analyzer::load::{load_config_file, LoadOptions, LoadedConfig};
use fortigate_analyzer::report::{render_diff_text, DiffReport};
use tracing_subscriber::EnvFilter;

mod audit_cmd;
mod cli;
mod path_guard;
mod report_cmd;
mod topology_cmd;
mod trace_cmd;

use cli::{Cli, Command, DiffArgs, InspectArgs, OutputFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let vdom = cli.vdom.as_deref();
    match cli.command {
        Command::Inspect(args) => run_inspect(args, vdom),
        Command::Audit(args) => audit_cmd::run_audit(args, vdom),
        Command::Topology(args) => topology_cmd::run_topology(args, vdom),
        Command::Trace(args) => trace_cmd::run_trace(args, vdom),
        Command::Report(args) => report_cmd::run_report(args, vdom),
        Command::Diff(args) => run_diff(args),
    }
}

/// Parse and resolve one configuration file for the selected VDOM.
pub(crate) fn load_input(path: &Path, vdom: Option<&str>) -> Result<LoadedConfig> {
    let options = LoadOptions {
        vdom: vdom.map(str::to_string),
    };
    load_config_file(path, &options).with_context(|| format!("failed to parse {}", path.display()))
}

fn run_diff(args: DiffArgs) -> Result<()> {
    let left = parse_file(&args.file1)
        .with_context(|| format!("failed to parse {}", args.file1.display()))?;
    let right = parse_file(&args.file2)
        .with_context(|| format!("failed to parse {}", args.file2.display()))?;

    let opts = DiffOptions {
        include_identical: args.verbose,
        ignore_paths: args.ignore,
        ..DiffOptions::default()
    };

    let mut entries = diff_with_options(&left, &right, &opts);
    if let Some(section) = &args.section {
        entries = filter_section(entries, section);
    }

    let report = DiffReport::new(entries);
    if args.summary {
        println!("{}", report.summary.to_string().cyan());
        return Ok(());
    }

    match args.format {
        OutputFormat::Text => {
            if report.entries.is_empty() {
                println!("no differences");
            } else {
                println!("{}", render_diff_text(&report.entries));
            }
            println!();
            println!("{}", report.summary.to_string().cyan());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn run_inspect(args: InspectArgs, vdom: Option<&str>) -> Result<()> {
    if args.diagnostics {
        let loaded = load_input(&args.file, vdom)?;
        println!(
            "diagnostics total={} warnings={}",
            loaded.diagnostics.len(),
            loaded.warnings().count()
        );
        if loaded.diagnostics.is_empty() {
            println!("- none");
        }
        for diagnostic in &loaded.diagnostics {
            match diagnostic.line() {
                Some(line) => println!(
                    "- [{}] {} line {line}: {diagnostic}",
                    diagnostic.level(),
                    diagnostic.code()
                ),
                None => println!(
                    "- [{}] {}: {diagnostic}",
                    diagnostic.level(),
                    diagnostic.code()
                ),
            }
        }
        return Ok(());
    }

    let tree = parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    if let Some(section) = args.section {
        let block = tree
            .block(&section)
            .with_context(|| format!("section '{}' not found", section))?;
        if args.raw {
            print!("{}", write_block(block));
        } else {
            print!("{}", render_section(block, args.depth));
        }
        return Ok(());
    }

    if args.raw {
        print!("{}", write(&tree));
    } else {
        print!("{}", render_tree(&tree, args.depth));
    }
    Ok(())
}

/// Keep entries whose path starts with the section, e.g. `firewall policy`
/// keeps `firewall policy[3].srcaddr`.
fn filter_section(entries: Vec<DiffEntry>, section: &str) -> Vec<DiffEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(section)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['[', '.', ' ']))
        })
        .collect()
}
