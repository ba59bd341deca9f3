use anyhow::Result;
use fortigate_analyzer::audit::load_audit_config;
use fortigate_analyzer::report::{build_full_report, render_full_report_text};

use crate::cli::{OutputFormat, ReportArgs};
use crate::load_input;

pub fn run_report(args: ReportArgs, vdom: Option<&str>) -> Result<()> {
    let loaded = load_input(&args.file, vdom)?;
    let (config, _) = load_audit_config(args.rules_file.as_deref())?;
    let report = build_full_report(&loaded, &config);

    match args.format {
        OutputFormat::Text => println!("{}", render_full_report_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
