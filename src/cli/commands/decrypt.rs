//! `crypttool decrypt`: decrypt one secret of a Paas to stdout.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::{load_private_keys, read_input};
use crate::config::Settings;
use crate::crypto::CipherSession;
use crate::errors::{CryptError, Result};

/// Execute the `decrypt` command.
pub fn execute(
    settings: &Settings,
    private_key_files: &[PathBuf],
    paas: &str,
    data_file: Option<&Path>,
) -> Result<()> {
    let keys = load_private_keys(settings, private_key_files)?;
    let input = read_input(data_file)?;
    let envelope = std::str::from_utf8(&input)
        .map_err(|_| CryptError::CorruptEnvelope("input is not valid UTF-8".into()))?;

    let session = CipherSession::for_decryption(paas, &keys)?;
    let plaintext = session.decrypt(envelope)?;

    // Raw bytes, no trailing newline: the secret may be binary.
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&plaintext)?;
    stdout.flush()?;

    Ok(())
}
