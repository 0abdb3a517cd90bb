use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CryptError, Result};

/// Project-level configuration, loaded from `.crypttool.toml`.
///
/// Every field is optional so crypttool works without any config file;
/// command-line flags and environment variables always take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// File or directory holding the private keys used for decryption.
    #[serde(default)]
    pub private_key_path: Option<String>,

    /// Public key file used for encryption.
    #[serde(default)]
    pub public_key_path: Option<String>,

    /// Capabilities a Paas record may enable. Empty means "do not check".
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".crypttool.toml";

    /// Load settings from `<project_dir>/.crypttool.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        Self::load_file(&project_dir.join(Self::FILE_NAME), false)
    }

    /// Load settings from an explicit path.
    ///
    /// With `required` set, a missing file is an error instead of defaults.
    pub fn load_file(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                return Err(CryptError::Config(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents)
            .map_err(|e| CryptError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Resolve the private key paths: explicit values win over the file.
    pub fn private_key_paths(&self, explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }
        self.private_key_path
            .as_deref()
            .map(|p| vec![PathBuf::from(p)])
            .ok_or_else(|| {
                CryptError::Configuration(
                    "no private key path given (use --private-key-files or PAAS_PRIVATE_KEY_PATH)"
                        .into(),
                )
            })
    }

    /// Resolve the public key path: an explicit value wins over the file.
    pub fn public_key_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        self.public_key_path
            .as_deref()
            .map(PathBuf::from)
            .ok_or_else(|| {
                CryptError::Configuration(
                    "no public key path given (use --public-key-file or PAAS_PUBLIC_KEY_PATH)"
                        .into(),
                )
            })
    }
}
