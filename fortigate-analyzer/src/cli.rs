use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fortigate_analyzer::audit::Severity;
use fortigate_analyzer::packet::Protocol;

#[derive(Parser, Debug)]
#[command(name = "fortigate-analyzer")]
#[command(about = "Inspect, trace, map and audit FortiGate firewall configurations")]
pub struct Cli {
    /// VDOM to analyze in a multi-VDOM configuration (default: root, else the first VDOM).
    #[arg(long, global = true)]
    pub vdom: Option<String>,
    /// Log filter for stderr diagnostics (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Show the block structure of a configuration and its load diagnostics.
    Inspect(InspectArgs),
    /// Run audit rules and report findings.
    Audit(AuditArgs),
    /// Build the zone/interface topology graph.
    Topology(TopologyArgs),
    /// Trace a synthetic packet through routing, policy and NAT.
    Trace(TraceArgs),
    /// Summary counts, unused objects, connectivity tree and audit in one report.
    Report(ReportArgs),
    /// Compare two configuration files.
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    pub file: PathBuf,
    /// Top-level section to show, for example "firewall policy".
    #[arg(long)]
    pub section: Option<String>,
    #[arg(long, default_value_t = 3)]
    pub depth: usize,
    /// Print canonical configuration text instead of the tree.
    #[arg(long)]
    pub raw: bool,
    /// List load and resolution diagnostics.
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Config file to audit.
    pub file: PathBuf,
    /// Audit rule configuration (TOML). Defaults to the embedded rule set.
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
    /// Hide findings below this severity.
    #[arg(long, value_enum)]
    pub min_severity: Option<SeverityArg>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Show data source metadata.
    #[arg(long)]
    pub verbose: bool,
    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct TopologyArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = TopologyFormat::Json)]
    pub format: TopologyFormat,
    /// Write to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Leave deny-only edges out of the graph.
    #[arg(long)]
    pub no_blocked: bool,
}

#[derive(Parser, Debug)]
pub struct TraceArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub src: Ipv4Addr,
    #[arg(long)]
    pub dst: Ipv4Addr,
    /// Destination port, or ICMP type for icmp.
    #[arg(long)]
    pub port: Option<u16>,
    /// tcp, udp, sctp, icmp or an IP protocol number.
    #[arg(long, default_value = "tcp")]
    pub protocol: Protocol,
    /// Ingress interface. Inferred from the source address when omitted.
    #[arg(long)]
    pub ingress: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ReportArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    /// Only show paths under this section, for example "firewall policy".
    #[arg(long)]
    pub section: Option<String>,
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub summary: bool,
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum TopologyFormat {
    Json,
    Dot,
    Graphml,
    /// Indented zone/interface/policy tree.
    Tree,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum SeverityArg {
    Info,
    Warning,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}
