//! Paas resource records, as far as secrets are concerned.
//!
//! Only the fields that carry or identify secrets are modelled:
//! `metadata.name`, `spec.sshSecrets` and `spec.capabilities.<name>.sshSecrets`.
//! The parsed document is kept alongside that view and is what gets written
//! back, so key order and every other field survive a re-encryption.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tempfile::NamedTempFile;

use crate::errors::{CryptError, Result};

/// Serialization format of a record file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Yaml,
    Json,
}

impl RecordFormat {
    /// `.json` is JSON, everything else is treated as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RecordFormat::Json,
            _ => RecordFormat::Yaml,
        }
    }
}

/// A Paas document: the secret-carrying view plus the document itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PaasRecord {
    pub metadata: RecordMetadata,
    pub spec: PaasSpec,
    document: Value,
}

#[derive(Deserialize)]
struct RecordView {
    metadata: RecordMetadata,
    #[serde(default)]
    spec: PaasSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordMetadata {
    /// Record identity; the encryption context of every secret in the record.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaasSpec {
    #[serde(default)]
    pub ssh_secrets: BTreeMap<String, String>,

    #[serde(default)]
    pub capabilities: BTreeMap<String, PaasCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaasCapability {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub ssh_secrets: BTreeMap<String, String>,
}

impl PaasSpec {
    fn set_secret(&mut self, slot: &SecretSlot, value: &str) {
        let secrets = match &slot.capability {
            None => Some(&mut self.ssh_secrets),
            Some(cap) => self.capabilities.get_mut(cap).map(|c| &mut c.ssh_secrets),
        };
        if let Some(secrets) = secrets {
            secrets.insert(slot.key.clone(), value.to_string());
        }
    }
}

/// Where a secret lives in the document.
struct SecretSlot {
    capability: Option<String>,
    key: String,
}

impl SecretSlot {
    fn label(&self) -> String {
        match &self.capability {
            None => spec_label(&self.key),
            Some(cap) => capability_label(cap, &self.key),
        }
    }
}

impl PaasRecord {
    /// Parse a record from text in the given format.
    pub fn parse(text: &str, format: RecordFormat) -> std::result::Result<Self, String> {
        let document: Value = match format {
            RecordFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string())?,
            RecordFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string())?,
        };

        let view: RecordView =
            serde_yaml::from_value(document.clone()).map_err(|e| e.to_string())?;

        Ok(Self {
            metadata: view.metadata,
            spec: view.spec,
            document,
        })
    }

    /// Read a record file; the format follows the file extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, RecordFormat::from_path(path)).map_err(|cause| CryptError::Record {
            path: path.to_path_buf(),
            cause,
        })
    }

    /// Serialize the document in the given format.
    pub fn render(&self, format: RecordFormat) -> std::result::Result<String, String> {
        match format {
            RecordFormat::Yaml => serde_yaml::to_string(&self.document).map_err(|e| e.to_string()),
            RecordFormat::Json => serde_json::to_string_pretty(&self.document)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
        }
    }

    /// Write the record back **atomically** (temp file + rename), in the
    /// format matching the file extension.  An existing file keeps its
    /// permissions; the temp file is removed if anything fails.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let contents = self
            .render(RecordFormat::from_path(path))
            .map_err(|cause| CryptError::Record {
                path: path.to_path_buf(),
                cause,
            })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(tmp.path(), meta.permissions())?;
        }
        tmp.persist(path).map_err(|e| CryptError::Io(e.error))?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// All `(label, envelope)` pairs of the record, in a stable order:
    /// top-level secrets first, then per capability.
    pub fn secrets(&self) -> Vec<(String, String)> {
        let mut secrets: Vec<(String, String)> = self
            .spec
            .ssh_secrets
            .iter()
            .map(|(key, value)| (spec_label(key), value.clone()))
            .collect();

        for (cap, capability) in &self.spec.capabilities {
            for (key, value) in &capability.ssh_secrets {
                secrets.push((capability_label(cap, key), value.clone()));
            }
        }

        secrets
    }

    /// Replace every secret with `f(secret)`, in place in the document.
    ///
    /// Returns the updated copy only if every call succeeded; otherwise the
    /// labelled errors are returned and nothing is changed.
    pub fn map_secrets<F>(&self, mut f: F) -> std::result::Result<Self, Vec<(String, CryptError)>>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut updated = self.clone();
        let mut errors = Vec::new();

        for (slot, value) in secret_slots_mut(&mut updated.document) {
            match f(value) {
                Ok(new_value) => {
                    updated.spec.set_secret(&slot, &new_value);
                    *value = new_value;
                }
                Err(e) => errors.push((slot.label(), e)),
            }
        }

        if errors.is_empty() {
            Ok(updated)
        } else {
            Err(errors)
        }
    }

    /// Capabilities in this record that are not in `allowed`.
    ///
    /// An empty allow-list disables the check.
    pub fn unknown_capabilities<'a>(&'a self, allowed: &[String]) -> Vec<&'a str> {
        if allowed.is_empty() {
            return Vec::new();
        }
        self.spec
            .capabilities
            .keys()
            .filter(|name| !allowed.contains(name))
            .map(String::as_str)
            .collect()
    }
}

/// Every string under `spec.sshSecrets` and `spec.capabilities.*.sshSecrets`,
/// in document order.
fn secret_slots_mut(document: &mut Value) -> Vec<(SecretSlot, &mut String)> {
    let mut slots = Vec::new();
    let Some(spec) = document.get_mut("spec").and_then(Value::as_mapping_mut) else {
        return slots;
    };

    for (field, value) in spec.iter_mut() {
        match field.as_str() {
            Some("sshSecrets") => collect_slots(value, None, &mut slots),
            Some("capabilities") => {
                let Some(capabilities) = value.as_mapping_mut() else {
                    continue;
                };
                for (cap, capability) in capabilities.iter_mut() {
                    let (Some(cap), Some(secrets)) = (cap.as_str(), capability.get_mut("sshSecrets"))
                    else {
                        continue;
                    };
                    collect_slots(secrets, Some(cap), &mut slots);
                }
            }
            _ => {}
        }
    }

    slots
}

fn collect_slots<'a>(
    secrets: &'a mut Value,
    capability: Option<&str>,
    slots: &mut Vec<(SecretSlot, &'a mut String)>,
) {
    let Some(secrets) = secrets.as_mapping_mut() else {
        return;
    };
    for (key, value) in secrets.iter_mut() {
        if let (Some(key), Value::String(value)) = (key.as_str(), value) {
            let slot = SecretSlot {
                capability: capability.map(str::to_string),
                key: key.to_string(),
            };
            slots.push((slot, value));
        }
    }
}

fn spec_label(key: &str) -> String {
    format!(".spec.sshSecrets[{key}]")
}

fn capability_label(cap: &str, key: &str) -> String {
    format!(".spec.capabilities[{cap}].sshSecrets[{key}]")
}

/// Expand files and directories into the list of record files.
///
/// Directories are walked recursively and only `.yaml`, `.yml` and `.json`
/// files are kept.  Files named explicitly are kept whatever their extension.
pub fn expand_record_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            walk_dir(path, &mut files)?;
        } else if path.exists() {
            files.push(path.to_path_buf());
        } else {
            return Err(CryptError::CommandFailed(format!(
                "path {} does not exist",
                path.display()
            )));
        }
    }
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk_dir(&entry, files)?;
        } else if is_record_file(&entry) {
            files.push(entry);
        }
    }
    Ok(())
}

fn is_record_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "json")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAAS_YAML: &str = r#"
apiVersion: cpet.belastingdienst.nl/v1alpha1
kind: Paas
metadata:
  name: my-paas
  labels:
    team: blue
spec:
  oplosGroep: team-blue
  sshSecrets:
    ssh://git@github.com/org/repo: v1:AAAA
  capabilities:
    argocd:
      enabled: true
      gitUrl: ssh://git@github.com/org/gitops
      sshSecrets:
        ssh://git@github.com/org/gitops: v1:BBBB
    ci:
      enabled: false
"#;

    #[test]
    fn parses_secrets_and_identity() {
        let record = PaasRecord::parse(PAAS_YAML, RecordFormat::Yaml).unwrap();
        assert_eq!(record.name(), "my-paas");

        let secrets = record.secrets();
        assert_eq!(
            secrets,
            vec![
                (
                    ".spec.sshSecrets[ssh://git@github.com/org/repo]".to_string(),
                    "v1:AAAA".to_string()
                ),
                (
                    ".spec.capabilities[argocd].sshSecrets[ssh://git@github.com/org/gitops]"
                        .to_string(),
                    "v1:BBBB".to_string()
                ),
            ]
        );
    }

    #[test]
    fn unknown_fields_survive_a_rewrite() {
        let record = PaasRecord::parse(PAAS_YAML, RecordFormat::Yaml).unwrap();
        let rendered = record.render(RecordFormat::Yaml).unwrap();
        let again = PaasRecord::parse(&rendered, RecordFormat::Yaml).unwrap();

        assert_eq!(again, record);
        assert!(rendered.starts_with("apiVersion: cpet.belastingdienst.nl/v1alpha1\nkind: Paas\n"));
        assert!(rendered.contains("oplosGroep: team-blue"));
        assert!(rendered.contains("gitUrl: ssh://git@github.com/org/gitops"));
        assert!(rendered.contains("kind: Paas"));
    }

    #[test]
    fn parses_json_records() {
        let json = r#"{"metadata":{"name":"json-paas"},"spec":{"sshSecrets":{"a":"v1:CCCC"}}}"#;
        let record = PaasRecord::parse(json, RecordFormat::Json).unwrap();
        assert_eq!(record.name(), "json-paas");
        assert_eq!(record.secrets().len(), 1);
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(PaasRecord::parse("spec: {}\n", RecordFormat::Yaml).is_err());
    }

    #[test]
    fn map_secrets_is_all_or_nothing() {
        let record = PaasRecord::parse(PAAS_YAML, RecordFormat::Yaml).unwrap();

        let updated = record.map_secrets(|s| Ok(s.to_lowercase())).unwrap();
        assert_eq!(updated.spec.ssh_secrets.values().next().unwrap(), "v1:aaaa");
        assert!(updated
            .render(RecordFormat::Yaml)
            .unwrap()
            .contains("ssh://git@github.com/org/gitops: v1:bbbb"));

        let failed = record.map_secrets(|s| {
            if s.ends_with("BBBB") {
                Err(CryptError::Decrypt { attempts: 1 })
            } else {
                Ok(s.to_string())
            }
        });
        let errors = failed.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.starts_with(".spec.capabilities[argocd]"));
    }

    #[test]
    fn capability_allow_list() {
        let record = PaasRecord::parse(PAAS_YAML, RecordFormat::Yaml).unwrap();

        assert!(record.unknown_capabilities(&[]).is_empty());
        assert_eq!(
            record.unknown_capabilities(&["argocd".to_string()]),
            vec!["ci"]
        );
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(RecordFormat::from_path(Path::new("a.json")), RecordFormat::Json);
        assert_eq!(RecordFormat::from_path(Path::new("a.JSON")), RecordFormat::Json);
        assert_eq!(RecordFormat::from_path(Path::new("a.yml")), RecordFormat::Yaml);
        assert_eq!(RecordFormat::from_path(Path::new("a")), RecordFormat::Yaml);
    }

    #[test]
    fn collects_record_files_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("team")).unwrap();
        fs::write(dir.path().join("b.yaml"), "").unwrap();
        fs::write(dir.path().join("a.json"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("team").join("c.yml"), "").unwrap();

        let files = expand_record_paths(&[dir.path()]).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.json"),
                dir.path().join("b.yaml"),
                dir.path().join("team").join("c.yml"),
            ]
        );
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(expand_record_paths(&[dir.path().join("nope")]).is_err());
    }

    #[test]
    fn write_file_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paas.yaml");
        fs::write(&path, PAAS_YAML).unwrap();

        let record = PaasRecord::from_file(&path).unwrap();
        let updated = record.map_secrets(|_| Ok("v1:DDDD".to_string())).unwrap();
        updated.write_file(&path).unwrap();

        let reread = PaasRecord::from_file(&path).unwrap();
        assert!(reread.secrets().iter().all(|(_, v)| v == "v1:DDDD"));

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "no temp file may be left behind");
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory in the way makes the final rename fail.
        let path = dir.path().join("paas.yaml");
        fs::create_dir(&path).unwrap();

        let record = PaasRecord::parse(PAAS_YAML, RecordFormat::Yaml).unwrap();
        assert!(record.write_file(&path).is_err());

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("paas.yaml")]);
    }

    #[cfg(unix)]
    #[test]
    fn write_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paas.yaml");
        fs::write(&path, PAAS_YAML).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let record = PaasRecord::from_file(&path).unwrap();
        record.write_file(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
