use anyhow::Result;
use fortigate_analyzer::packet::PacketDescriptor;
use fortigate_analyzer::trace::{render_trace_text, simulate};

use crate::cli::{OutputFormat, TraceArgs};
use crate::load_input;

pub fn run_trace(args: TraceArgs, vdom: Option<&str>) -> Result<()> {
    let loaded = load_input(&args.file, vdom)?;

    let mut packet = PacketDescriptor::new(args.src, args.dst, args.protocol);
    if let Some(port) = args.port {
        packet = packet.with_port(port);
    }
    if let Some(ingress) = args.ingress {
        packet = packet.with_ingress(ingress);
    }

    let trace = simulate(&loaded.model, &packet);
    match args.format {
        OutputFormat::Text => println!("{}", render_trace_text(&trace)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trace)?),
    }
    Ok(())
}
