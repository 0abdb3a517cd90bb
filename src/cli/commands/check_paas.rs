//! `crypttool check-paas`: verify that every secret in Paas files decrypts.
//!
//! Prints checksum and length per secret (never the secret itself), then
//! `Finished with N errors`.  Any failure makes the command fail.

use std::path::PathBuf;

use crate::audit::{Auditor, RecordBatch, SecretOutcome, SecretStatus};
use crate::cli::{load_private_keys, output, OutputFormat};
use crate::config::Settings;
use crate::crypto::{CipherSession, Key};
use crate::errors::{CryptError, Result};
use crate::record::{expand_record_paths, PaasRecord};

/// Label used for a file that could not be parsed as a Paas at all.
const DOCUMENT_LABEL: &str = "<document>";

/// Execute the `check-paas` command.
pub fn execute(
    settings: &Settings,
    private_key_files: &[PathBuf],
    format: OutputFormat,
    files: &[PathBuf],
) -> Result<()> {
    let keys = load_private_keys(settings, private_key_files)?;
    let paths = expand_record_paths(files)?;

    let mut auditor = Auditor::new();
    let mut pending: Vec<(String, PaasRecord)> = Vec::new();

    for path in &paths {
        let source = path.display().to_string();
        match PaasRecord::from_file(path) {
            Ok(record) => {
                for cap in record.unknown_capabilities(&settings.capabilities) {
                    output::warning(&format!(
                        "{source}: capability '{cap}' is not in the configured list"
                    ));
                }
                pending.push((source, record));
            }
            Err(e) => {
                // Keep report order equal to file order.
                audit_pending(&mut auditor, &mut pending, &keys)?;
                auditor.push(SecretOutcome {
                    source,
                    record: String::new(),
                    label: DOCUMENT_LABEL.to_string(),
                    status: SecretStatus::Failed {
                        error: e.to_string(),
                    },
                });
            }
        }
    }
    audit_pending(&mut auditor, &mut pending, &keys)?;

    let report = auditor.finish();
    match format {
        OutputFormat::Table => output::print_audit_table(&report),
        OutputFormat::Json => output::print_audit_json(&report)?,
    }

    let report = report.into_result()?;
    output::success(&format!("Finished with {} errors", report.failures()));
    Ok(())
}

fn audit_pending(
    auditor: &mut Auditor,
    pending: &mut Vec<(String, PaasRecord)>,
    keys: &[Key],
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let batches = pending
        .iter()
        .map(|(source, record)| -> Result<RecordBatch<'_>> {
            Ok(RecordBatch {
                source: source.clone(),
                session: CipherSession::for_decryption(record.name(), keys)?,
                secrets: record.secrets(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    auditor.audit_records(&batches);
    pending.clear();
    Ok(())
}
