//! FortiGate firewall configuration analysis.
//!
//! This library loads the CLI text a FortiGate produces with `show full-configuration`
//! into a typed, resolved object model and derives read-only views from it: a
//! zone/interface topology graph, a hop-by-hop packet trace and a rule-based
//! audit. Nothing is mutated after loading, so every view can be built
//! independently and in parallel.
//!
//! # Architecture
//!
//! ## Loading
//!
//! - [`load`]: Text (via `forticonf-core`) to [`model::ObjectModel`], VDOM selection
//! - [`sections`]: Per-section field tables and typed readers
//! - [`resolve`]: Name binding, zone membership, group expansion and cycle detection
//! - [`model`]: Entity types, handles and the immutable model
//! - [`diagnostics`]: Non-fatal load and resolution problems
//! - [`net`]: IPv4 subnet, range, port-range and interval helpers
//!
//! ## Views
//!
//! - [`topology`]: Zone/interface graph with permit and blocked edges
//! - [`export`]: Graphviz DOT and GraphML renderings of the graph
//! - [`connectivity`]: Zone → interface → policy tree
//! - [`trace`]: First-match path tracing with routing and NAT
//! - [`matching`]: Address, service and interface matching shared by trace and audit
//! - [`packet`]: Synthetic packet descriptors
//! - [`audit`]: Pluggable audit rules and their TOML configuration
//!
//! ## Reporting
//!
//! - [`report`]: Summary counts, unused objects, full report, colored diff output
//! - [`inspect`]: Block tree visualization
//!
//! # Examples
//!
//! ```ignore
//! use fortigate_analyzer::audit::{run_audit, AuditConfig};
//! use fortigate_analyzer::load::{load_config_file, LoadOptions};
//! use fortigate_analyzer::packet::{PacketDescriptor, Protocol};
//! use fortigate_analyzer::trace::simulate;
//!
//! let loaded = load_config_file("fw.conf".as_ref(), &LoadOptions::default())?;
//! let report = run_audit(&loaded.model, &AuditConfig::default());
//! println!("critical findings: {}", report.counts.critical);
//!
//! let packet = PacketDescriptor::new(
//!     "192.168.10.20".parse()?,
//!     "198.51.100.7".parse()?,
//!     Protocol::Tcp,
//! )
//! .with_port(443);
//! println!("{}", simulate(&loaded.model, &packet).disposition);
//! ```

pub mod audit;
pub mod connectivity;
pub mod diagnostics;
pub mod export;
pub mod inspect;
pub mod load;
pub mod matching;
pub mod model;
pub mod net;
pub mod packet;
pub mod report;
pub mod resolve;
pub mod sections;
pub mod topology;
pub mod trace;
