//! Console and JSON rendering of a run.

use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::config::OmittedEntry;
use crate::dispatch::{RunReport, RunSummary, TargetOutcome, TargetReport};

/// Width of the label column.
const LABEL_WIDTH: usize = 10;

/// Width of the identity column.
const IDENTITY_WIDTH: usize = 30;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// One line per target.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    targets: &'a [TargetReport],
    omitted: &'a [OmittedEntry],
    summary: &'a RunSummary,
}

/// Write the report in `format`.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn render(
    out: &mut impl Write,
    format: OutputFormat,
    report: &RunReport,
    omitted: &[OmittedEntry],
) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(out, report, omitted),
        OutputFormat::Json => render_json(out, report, omitted),
    }
}

/// One line per target, then one per omitted host entry.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn render_text(
    out: &mut impl Write,
    report: &RunReport,
    omitted: &[OmittedEntry],
) -> io::Result<()> {
    for target in &report.targets {
        writeln!(out, "{}", format_target(target))?;
    }

    for entry in omitted {
        writeln!(
            out,
            "{:<LABEL_WIDTH$} {:<IDENTITY_WIDTH$}: {} ({})",
            "config",
            entry.address.as_deref().unwrap_or("-"),
            "SKIP".yellow().bold(),
            entry.reason
        )?;
    }

    Ok(())
}

/// Format a single target line, e.g. `tcp/443    db.internal    : PASS(1.52ms)`.
pub fn format_target(target: &TargetReport) -> String {
    let verdict = match &target.outcome {
        TargetOutcome::Completed(result) if result.passed => format!(
            "{}({:.2}ms)",
            "PASS".bright_green().bold(),
            result.latency_ms
        ),
        TargetOutcome::Completed(_) => "FAIL".bright_red().bold().to_string(),
        TargetOutcome::Skipped { reason } => format!("{} ({reason})", "SKIP".yellow().bold()),
    };

    format!(
        "{:<LABEL_WIDTH$} {:<IDENTITY_WIDTH$}: {}",
        target.label, target.identity, verdict
    )
}

/// The whole run as one JSON document.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn render_json(
    out: &mut impl Write,
    report: &RunReport,
    omitted: &[OmittedEntry],
) -> io::Result<()> {
    let document = JsonReport {
        targets: &report.targets,
        omitted,
        summary: &report.summary,
    };
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use crate::target::Protocol;
    use serde_json::Value;

    fn sample_report() -> RunReport {
        RunReport {
            targets: vec![
                TargetReport {
                    index: 0,
                    address: "db.internal".to_string(),
                    protocol: Protocol::Tcp,
                    label: "tcp/5432".to_string(),
                    identity: "db.internal".to_string(),
                    outcome: TargetOutcome::Completed(ProbeResult {
                        passed: true,
                        latency_ms: 1.234,
                        detail: "10.0.0.5:5432".to_string(),
                    }),
                },
                TargetReport {
                    index: 1,
                    address: "app.internal".to_string(),
                    protocol: Protocol::HttpStatus,
                    label: "httpstatus".to_string(),
                    identity: "http://app.internal".to_string(),
                    outcome: TargetOutcome::Completed(ProbeResult {
                        passed: false,
                        latency_ms: 12.0,
                        detail: "status 503, expected 200".to_string(),
                    }),
                },
                TargetReport {
                    index: 2,
                    address: "http://".to_string(),
                    protocol: Protocol::Icmp,
                    label: "ping".to_string(),
                    identity: "http://".to_string(),
                    outcome: TargetOutcome::Skipped {
                        reason: "no usable host in address 'http://'".to_string(),
                    },
                },
            ],
            summary: RunSummary {
                total_failures: 1,
                passed: 1,
                skipped: 1,
            },
        }
    }

    fn omitted() -> Vec<OmittedEntry> {
        vec![OmittedEntry {
            index: 3,
            address: Some("10.0.0.7".to_string()),
            reason: "unknown protocol 'snmp'".to_string(),
        }]
    }

    #[test]
    fn test_render_text() {
        colored::control::set_override(false);

        let mut out = Vec::new();
        render_text(&mut out, &sample_report(), &omitted()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("tcp/5432   db.internal"));
        assert!(lines[0].ends_with(": PASS(1.23ms)"));
        assert!(lines[1].contains("http://app.internal"));
        assert!(lines[1].ends_with(": FAIL"));
        assert!(lines[2].contains("SKIP (no usable host"));
        assert!(lines[3].starts_with("config"));
        assert!(lines[3].contains("unknown protocol 'snmp'"));
    }

    #[test]
    fn test_render_json() {
        let mut out = Vec::new();
        render(&mut out, OutputFormat::Json, &sample_report(), &omitted()).unwrap();
        let json: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(json["summary"]["total_failures"], 1);
        assert_eq!(json["targets"][0]["status"], "completed");
        assert_eq!(json["targets"][0]["passed"], true);
        assert_eq!(json["targets"][1]["protocol"], "httpstatus");
        assert_eq!(json["targets"][2]["status"], "skipped");
        assert_eq!(json["omitted"][0]["index"], 3);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().ok(), Some(OutputFormat::Json));
        assert_eq!("TEXT".parse::<OutputFormat>().ok(), Some(OutputFormat::Text));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
