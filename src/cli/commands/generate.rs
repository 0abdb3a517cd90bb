//! `crypttool generate`: create a new X25519 key pair.

use std::path::Path;

use crate::cli::output;
use crate::crypto::generate_key_pair;
use crate::errors::Result;

/// Execute the `generate` command.
pub fn execute(private_key_file: &Path, public_key_file: &Path) -> Result<()> {
    let key = generate_key_pair(private_key_file, public_key_file)?;

    output::success(&format!(
        "Generated key pair {} ({} / {})",
        key.fingerprint(),
        private_key_file.display(),
        public_key_file.display()
    ));
    output::tip("Keep the private key out of version control.");

    Ok(())
}
