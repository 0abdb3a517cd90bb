use std::path::PathBuf;
use thiserror::Error;

use crate::crypto::keys::KeyRole;

/// All errors that can occur in crypttool.
#[derive(Debug, Error)]
pub enum CryptError {
    // --- Key material errors ---
    #[error("Cannot load key from {path}: {cause}")]
    KeyLoad { path: PathBuf, cause: String },

    #[error("No valid {role} keys found")]
    NoValidKeys { role: KeyRole },

    // --- Session errors ---
    #[error("Configuration error: {0}")]
    Configuration(String),

    // --- Envelope errors ---
    #[error("Corrupt envelope: {0}")]
    CorruptEnvelope(String),

    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    // --- Crypto errors ---
    /// No key + context combination authenticated the envelope. Deliberately
    /// silent about whether the key or the context was wrong.
    #[error("Unable to decrypt secret ({attempts} key(s) tried)")]
    Decrypt { attempts: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // --- Record errors ---
    #[error("Invalid record {path}: {cause}")]
    Record { path: PathBuf, cause: String },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Finished with {failures} errors")]
    AuditFailed { failures: usize },
}

/// Convenience type alias for crypttool results.
pub type Result<T> = std::result::Result<T, CryptError>;
