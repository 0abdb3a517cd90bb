//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod logging;
pub mod output;

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::{self, Key, KeyRole};
use crate::errors::{CryptError, Result};

/// crypttool: encrypt and audit secrets embedded in Paas records.
#[derive(Parser)]
#[command(
    name = "crypttool",
    about = "Encrypt, decrypt and audit secrets bound to Paas records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug diagnostics on stderr (RUST_LOG overrides)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Settings file (default: ./.crypttool.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a new X25519 key pair
    Generate {
        /// Where to write the private key (PEM)
        #[arg(long)]
        private_key_file: PathBuf,
        /// Where to write the public key (PEM)
        #[arg(long)]
        public_key_file: PathBuf,
    },

    /// Encrypt a secret for a Paas
    Encrypt {
        /// Public key file
        #[arg(long, env = "PAAS_PUBLIC_KEY_PATH")]
        public_key_file: Option<PathBuf>,
        /// Name of the Paas the secret belongs to
        #[arg(long)]
        paas: String,
        /// Read the secret from this file instead of stdin
        #[arg(long)]
        data_file: Option<PathBuf>,
    },

    /// Decrypt a secret of a Paas
    Decrypt {
        /// Private key files or directories (comma separated)
        #[arg(long, env = "PAAS_PRIVATE_KEY_PATH", value_delimiter = ',')]
        private_key_files: Vec<PathBuf>,
        /// Name of the Paas the secret belongs to
        #[arg(long)]
        paas: String,
        /// Read the envelope from this file instead of stdin
        #[arg(long)]
        data_file: Option<PathBuf>,
    },

    /// Re-encrypt every secret of Paas files under a new public key
    Reencrypt {
        /// Private key files or directories that open the current secrets
        #[arg(long, env = "PAAS_PRIVATE_KEY_PATH", value_delimiter = ',')]
        private_key_files: Vec<PathBuf>,
        /// Public key file to encrypt for
        #[arg(long, env = "PAAS_PUBLIC_KEY_PATH")]
        public_key_file: Option<PathBuf>,
        /// Paas files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check that every secret of Paas files can be decrypted
    CheckPaas {
        /// Private key files or directories (comma separated)
        #[arg(long, env = "PAAS_PRIVATE_KEY_PATH", value_delimiter = ',')]
        private_key_files: Vec<PathBuf>,
        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
        /// Paas files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Report format for `check-paas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load settings from `--config`, or from `.crypttool.toml` in the
/// working directory when no file was named.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => Settings::load_file(path, true),
        None => Settings::load(&std::env::current_dir()?),
    }
}

/// Load the private keys named on the command line (or in the settings).
///
/// Files that could not be used are reported as warnings.
pub fn load_private_keys(settings: &Settings, explicit: &[PathBuf]) -> Result<Vec<Key>> {
    let paths = settings.private_key_paths(explicit)?;
    let loaded = crypto::load_keys(&paths, KeyRole::Private)?;

    for rejected in &loaded.rejected {
        output::warning(&rejected.to_string());
    }

    Ok(loaded.keys)
}

/// Load the public key named on the command line (or in the settings).
pub fn load_public_key(settings: &Settings, explicit: Option<&Path>) -> Result<Key> {
    let path = settings.public_key_path(explicit)?;
    crypto::load_public_key(&path)
}

/// Read all input from `data_file`, or from stdin when none is given.
///
/// Returns `Zeroizing<Vec<u8>>` so a plaintext secret is wiped on drop.
pub fn read_input(data_file: Option<&Path>) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(Vec::new());
    match data_file {
        Some(path) => {
            let mut file = std::fs::File::open(path).map_err(|e| {
                CryptError::CommandFailed(format!("cannot read {}: {e}", path.display()))
            })?;
            file.read_to_end(&mut buf)?;
        }
        None => {
            std::io::stdin().read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}
