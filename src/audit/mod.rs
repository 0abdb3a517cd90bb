//! Batch auditing of encrypted secrets.
//!
//! Decrypts every secret of every record and reports, per secret, either a
//! checksum and length of the plaintext or the error.  The plaintext itself
//! never leaves this module and is wiped as soon as it has been measured.
//!
//! Checksums are SHA-256, rendered as lowercase hex.

use std::num::NonZeroUsize;
use std::thread;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::crypto::CipherSession;
use crate::errors::{CryptError, Result};

/// Secrets of one record, with the session bound to that record's name.
#[derive(Debug)]
pub struct RecordBatch<'k> {
    /// Where the record came from (file path), for display only.
    pub source: String,
    pub session: CipherSession<'k>,
    /// `(label, envelope)` pairs, e.g. `(".spec.sshSecrets[repo]", "v1:...")`.
    pub secrets: Vec<(String, String)>,
}

/// Result for one secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretOutcome {
    pub source: String,
    pub record: String,
    pub label: String,
    #[serde(flatten)]
    pub status: SecretStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecretStatus {
    Ok { checksum: String, length: usize },
    Failed { error: String },
}

impl SecretOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, SecretStatus::Failed { .. })
    }
}

/// Ordered outcomes of an audit run.  Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    outcomes: Vec<SecretOutcome>,
    failures: usize,
}

impl AuditReport {
    pub fn outcomes(&self) -> &[SecretOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// `Err(AuditFailed)` when at least one secret failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CryptError::AuditFailed {
                failures: self.failures,
            })
        }
    }
}

/// Builds an [`AuditReport`] one record at a time.
#[derive(Debug, Default)]
pub struct Auditor {
    outcomes: Vec<SecretOutcome>,
    failures: usize,
}

impl Auditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit every secret of `batch`; failures are recorded, never returned.
    pub fn audit_record(&mut self, batch: &RecordBatch<'_>) {
        for outcome in audit_batch(batch) {
            self.push(outcome);
        }
    }

    /// Audit several records concurrently, one scoped worker per chunk of
    /// records.  Outcomes are appended in input order.
    pub fn audit_records(&mut self, batches: &[RecordBatch<'_>]) {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(batches.len())
            .max(1);

        if workers == 1 {
            for batch in batches {
                self.audit_record(batch);
            }
            return;
        }

        let chunk_size = (batches.len() + workers - 1) / workers;
        let partials: Vec<Vec<SecretOutcome>> = thread::scope(|scope| {
            let handles: Vec<_> = batches
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || chunk.iter().flat_map(audit_batch).collect::<Vec<_>>())
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });

        for outcome in partials.into_iter().flatten() {
            self.push(outcome);
        }
    }

    /// Record an outcome produced elsewhere (e.g. a record that could not
    /// be read at all).
    pub fn push(&mut self, outcome: SecretOutcome) {
        if outcome.is_failure() {
            self.failures += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(self) -> AuditReport {
        AuditReport {
            outcomes: self.outcomes,
            failures: self.failures,
        }
    }
}

/// Audit all batches, spreading records over scoped worker threads.
///
/// The report lists outcomes in input order regardless of scheduling.
pub fn audit_records(batches: &[RecordBatch<'_>]) -> AuditReport {
    let mut auditor = Auditor::new();
    auditor.audit_records(batches);
    auditor.finish()
}

/// SHA-256 of `data` as lowercase hex.
pub fn checksum(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn audit_batch(batch: &RecordBatch<'_>) -> Vec<SecretOutcome> {
    batch
        .secrets
        .iter()
        .map(|(label, envelope)| audit_secret(batch, label, envelope))
        .collect()
}

fn audit_secret(batch: &RecordBatch<'_>, label: &str, envelope: &str) -> SecretOutcome {
    let status = match batch.session.decrypt(envelope) {
        Ok(plaintext) => {
            // `plaintext` is wiped when it goes out of scope at the end of this arm.
            let status = SecretStatus::Ok {
                checksum: checksum(&plaintext),
                length: plaintext.len(),
            };
            tracing::debug!(source = %batch.source, label, "secret verified");
            status
        }
        Err(e) => {
            tracing::debug!(source = %batch.source, label, error = %e, "secret failed");
            SecretStatus::Failed {
                error: e.to_string(),
            }
        }
    };

    SecretOutcome {
        source: batch.source.clone(),
        record: batch.session.context().to_string(),
        label: label.to_string(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Key;

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_auditor_reports_success() {
        let report = Auditor::new().finish();
        assert!(report.is_success());
        assert!(report.outcomes().is_empty());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn pushed_failures_are_counted() {
        let mut auditor = Auditor::new();
        auditor.push(SecretOutcome {
            source: "paas.yaml".into(),
            record: "paas".into(),
            label: "<document>".into(),
            status: SecretStatus::Failed {
                error: "unreadable".into(),
            },
        });

        let report = auditor.finish();
        assert_eq!(report.failures(), 1);
        assert!(matches!(
            report.into_result(),
            Err(CryptError::AuditFailed { failures: 1 })
        ));
    }

    #[test]
    fn corrupt_envelope_is_reported_not_returned() {
        let keys = vec![Key::generate()];
        let batch = RecordBatch {
            source: "paas.yaml".into(),
            session: CipherSession::for_decryption("paas", &keys).unwrap(),
            secrets: vec![(".spec.sshSecrets[a]".into(), "v1:broken".into())],
        };

        let mut auditor = Auditor::new();
        auditor.audit_record(&batch);
        let report = auditor.finish();

        assert_eq!(report.failures(), 1);
        assert!(report.outcomes()[0].is_failure());
        assert_eq!(report.outcomes()[0].record, "paas");
    }

    #[test]
    fn outcome_serializes_with_flat_status() {
        let outcome = SecretOutcome {
            source: "a.yaml".into(),
            record: "paas".into(),
            label: "x".into(),
            status: SecretStatus::Ok {
                checksum: "00".into(),
                length: 3,
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["length"], 3);
        assert_eq!(json["record"], "paas");
    }
}
