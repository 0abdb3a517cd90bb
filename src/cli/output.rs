//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditReport, SecretStatus};
use crate::errors::{CryptError, Result};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    eprintln!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    eprintln!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    eprintln!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print an audit report as a table (File, Paas, Secret, Result).
pub fn print_audit_table(report: &AuditReport) {
    if report.outcomes().is_empty() {
        info("No secrets found.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Paas", "Secret", "Result"]);

    for outcome in report.outcomes() {
        let result = match &outcome.status {
            SecretStatus::Ok { checksum, length } => {
                format!("{} (length {length})", short_checksum(checksum))
            }
            SecretStatus::Failed { error } => format!("ERROR: {error}"),
        };
        table.add_row(vec![
            outcome.source.clone(),
            outcome.record.clone(),
            outcome.label.clone(),
            result,
        ]);
    }

    println!("{table}");
}

/// Print an audit report as pretty JSON.
pub fn print_audit_json(report: &AuditReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CryptError::CommandFailed(format!("JSON serialization: {e}")))?;
    println!("{json}");
    Ok(())
}

fn short_checksum(checksum: &str) -> &str {
    checksum.get(..16).unwrap_or(checksum)
}
