//! `crypttool encrypt`: encrypt one secret for a Paas.
//!
//! The secret is read from `--data-file` or stdin; the envelope is printed
//! to stdout so it can be pasted into the Paas record.

use std::path::Path;

use crate::cli::{load_public_key, read_input};
use crate::config::Settings;
use crate::crypto::CipherSession;
use crate::errors::Result;

/// Execute the `encrypt` command.
pub fn execute(
    settings: &Settings,
    public_key_file: Option<&Path>,
    paas: &str,
    data_file: Option<&Path>,
) -> Result<()> {
    let public_key = load_public_key(settings, public_key_file)?;
    let plaintext = read_input(data_file)?;

    let session = CipherSession::for_encryption(paas, &public_key)?;
    let envelope = session.encrypt(&plaintext)?;

    tracing::debug!(paas, fingerprint = %public_key.fingerprint(), "secret encrypted");
    println!("{envelope}");

    Ok(())
}
