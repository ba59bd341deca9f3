use anyhow::{bail, Result};
use fortigate_analyzer::audit::{load_audit_config, render_audit_text, run_audit as run_audit_report};

use crate::cli::{AuditArgs, OutputFormat};
use crate::load_input;

pub fn run_audit(args: AuditArgs, vdom: Option<&str>) -> Result<()> {
    let loaded = load_input(&args.file, vdom)?;
    let (config, source) = load_audit_config(args.rules_file.as_deref())?;
    let mut report = run_audit_report(&loaded.model, &config);
    if let Some(min) = args.min_severity {
        report.retain_min_severity(min.into());
    }

    match args.format {
        OutputFormat::Text => {
            let source = args.verbose.then_some(source.as_str());
            println!("{}", render_audit_text(&report, source));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.counts.critical > 0 {
        bail!("audit failed: {} critical findings", report.counts.critical);
    }
    if args.strict && report.counts.warning > 0 {
        bail!(
            "audit failed in strict mode: {} warnings",
            report.counts.warning
        );
    }
    Ok(())
}
