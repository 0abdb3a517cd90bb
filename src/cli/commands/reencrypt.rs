//! `crypttool reencrypt`: move Paas secrets to a new key pair.
//!
//! Every secret is decrypted with the current private keys and encrypted
//! again for the new public key, with the Paas name as context.  A file is
//! rewritten only when all of its secrets could be decrypted.

use std::path::{Path, PathBuf};

use crate::cli::{load_private_keys, load_public_key, output};
use crate::config::Settings;
use crate::crypto::{CipherSession, Key};
use crate::errors::{CryptError, Result};
use crate::record::{expand_record_paths, PaasRecord};

/// Execute the `reencrypt` command.
pub fn execute(
    settings: &Settings,
    private_key_files: &[PathBuf],
    public_key_file: Option<&Path>,
    files: &[PathBuf],
) -> Result<()> {
    let keys = load_private_keys(settings, private_key_files)?;
    let public_key = load_public_key(settings, public_key_file)?;
    let paths = expand_record_paths(files)?;

    let mut skipped = 0;
    for path in &paths {
        match reencrypt_file(path, &keys, &public_key) {
            Ok(count) => output::success(&format!(
                "{}: re-encrypted {count} secrets",
                path.display()
            )),
            Err(e) => {
                skipped += 1;
                output::error(&format!("{}: {e}", path.display()));
            }
        }
    }

    if skipped > 0 {
        return Err(CryptError::CommandFailed(format!(
            "{skipped} of {} files were left unchanged",
            paths.len()
        )));
    }
    Ok(())
}

/// Re-encrypt one file in place.  Returns the number of secrets rewritten.
pub fn reencrypt_file(path: &Path, keys: &[Key], public_key: &Key) -> Result<usize> {
    let record = PaasRecord::from_file(path)?;
    let session = CipherSession::new(record.name(), keys, Some(public_key))?;

    let updated = record
        .map_secrets(|envelope| {
            let plaintext = session.decrypt(envelope)?;
            session.encrypt(&plaintext)
        })
        .map_err(|errors| {
            for (label, e) in &errors {
                output::warning(&format!("{}: {label}: {e}", path.display()));
            }
            CryptError::CommandFailed(format!(
                "{} secrets could not be re-encrypted",
                errors.len()
            ))
        })?;

    let count = updated.secrets().len();
    if count > 0 {
        updated.write_file(path)?;
    }
    tracing::debug!(path = %path.display(), count, "record re-encrypted");
    Ok(count)
}
