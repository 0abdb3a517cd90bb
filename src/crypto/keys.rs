//! Asymmetric key material: PEM parsing, loading from files and directories,
//! fingerprints and key-pair generation.
//!
//! Keys are X25519.  Private keys are PKCS#8 `PRIVATE KEY` documents and
//! public keys are SPKI `PUBLIC KEY` documents, the same files that
//! `openssl genpkey -algorithm X25519` produces.
//!
//! The fingerprint of a key is computed over its public half, so a private
//! key and its public counterpart always share a fingerprint.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use base64::Engine;
use pem::Pem;
use pkcs8::der::asn1::{BitStringRef, OctetStringRef};
use pkcs8::der::{Decode, Encode};
use pkcs8::{ObjectIdentifier, PrivateKeyInfo};
use rand::RngCore;
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::errors::{CryptError, Result};

/// Length of raw X25519 key material in bytes.
pub const KEY_LEN: usize = 32;

/// id-X25519 (RFC 8410).
const X25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");

const PRIVATE_PEM_TAG: &str = "PRIVATE KEY";
const PUBLIC_PEM_TAG: &str = "PUBLIC KEY";

/// Whether a key can encrypt (public) or decrypt (private).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Public,
    Private,
}

impl KeyRole {
    fn pem_tag(self) -> &'static str {
        match self {
            KeyRole::Public => PUBLIC_PEM_TAG,
            KeyRole::Private => PRIVATE_PEM_TAG,
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Public => f.write_str("public"),
            KeyRole::Private => f.write_str("private"),
        }
    }
}

/// Asymmetric algorithm of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    X25519,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::X25519 => f.write_str("x25519"),
        }
    }
}

/// Stable identifier of a key pair, e.g. `SHA256:3q2+7w...`.
///
/// Only meant for diagnostics; never used to decide which key to trust.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn of_public(public: &[u8; KEY_LEN]) -> Self {
        let digest = Sha256::digest(public);
        Self(format!("SHA256:{}", BASE64.encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single public or private key.
///
/// The raw material is wiped from memory when the key is dropped.
#[derive(Clone)]
pub struct Key {
    role: KeyRole,
    algorithm: KeyAlgorithm,
    material: Zeroizing<[u8; KEY_LEN]>,
    fingerprint: Fingerprint,
    source: Option<PathBuf>,
}

impl Key {
    fn new(role: KeyRole, material: [u8; KEY_LEN]) -> Self {
        let material = Zeroizing::new(material);
        let public = match role {
            KeyRole::Public => *material,
            KeyRole::Private => X25519PublicKey::from(&StaticSecret::from(*material)).to_bytes(),
        };
        Self {
            role,
            algorithm: KeyAlgorithm::X25519,
            fingerprint: Fingerprint::of_public(&public),
            material,
            source: None,
        }
    }

    /// Generate a fresh random private key.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(seed.as_mut());
        Self::new(KeyRole::Private, *seed)
    }

    /// Parse a PEM document holding either a private or a public key.
    pub fn from_pem(text: &str) -> Result<Self> {
        let doc = pem::parse(text)
            .map_err(|e| CryptError::Configuration(format!("not a PEM document: {e}")))?;

        match doc.tag() {
            PRIVATE_PEM_TAG => Ok(Self::new(KeyRole::Private, parse_private_der(doc.contents())?)),
            PUBLIC_PEM_TAG => Ok(Self::new(KeyRole::Public, parse_public_der(doc.contents())?)),
            other => Err(CryptError::Configuration(format!(
                "unexpected PEM tag '{other}'"
            ))),
        }
    }

    /// Serialize the key back to PEM.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        let der = match self.role {
            KeyRole::Private => encode_private_der(&self.material)?,
            KeyRole::Public => Zeroizing::new(encode_public_der(&self.material)?),
        };
        let doc = Pem::new(self.role.pem_tag(), der.to_vec());
        Ok(Zeroizing::new(pem::encode(&doc)))
    }

    /// The public counterpart of this key (a copy of itself for public keys).
    pub fn public_key(&self) -> Key {
        Key {
            role: KeyRole::Public,
            algorithm: self.algorithm,
            material: Zeroizing::new(self.x25519_public().to_bytes()),
            fingerprint: self.fingerprint.clone(),
            source: None,
        }
    }

    pub fn role(&self) -> KeyRole {
        self.role
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// File this key was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn x25519_public(&self) -> X25519PublicKey {
        match self.role {
            KeyRole::Public => X25519PublicKey::from(*self.material),
            KeyRole::Private => X25519PublicKey::from(&StaticSecret::from(*self.material)),
        }
    }

    /// `None` for public keys.
    pub(crate) fn x25519_secret(&self) -> Option<StaticSecret> {
        match self.role {
            KeyRole::Private => Some(StaticSecret::from(*self.material)),
            KeyRole::Public => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("role", &self.role)
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Result of loading keys from a set of paths.
#[derive(Debug)]
pub struct KeyLoad {
    /// Usable keys, in load order.
    pub keys: Vec<Key>,
    /// One `CryptError::KeyLoad` per file that could not be used.
    pub rejected: Vec<CryptError>,
}

/// Load all keys of `role` found at `paths`.
///
/// Each path is a key file or a directory; directories are expanded to the
/// regular files directly inside them (not recursively), sorted by name.
/// Unusable files are collected in [`KeyLoad::rejected`] and do not stop the
/// load.  Fails with [`CryptError::NoValidKeys`] when nothing usable is left.
pub fn load_keys<P: AsRef<Path>>(paths: &[P], role: KeyRole) -> Result<KeyLoad> {
    let mut keys = Vec::new();
    let mut rejected = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let files = match expand_key_path(path) {
            Ok(files) => files,
            Err(cause) => {
                tracing::warn!(path = %path.display(), error = %cause, "skipping key path");
                rejected.push(CryptError::KeyLoad {
                    path: path.to_path_buf(),
                    cause,
                });
                continue;
            }
        };

        for file in files {
            match load_key_file(&file, role) {
                Ok(key) => {
                    tracing::debug!(
                        path = %file.display(),
                        fingerprint = %key.fingerprint(),
                        %role,
                        "loaded key"
                    );
                    keys.push(key);
                }
                Err(cause) => {
                    tracing::warn!(path = %file.display(), error = %cause, "skipping key file");
                    rejected.push(CryptError::KeyLoad { path: file, cause });
                }
            }
        }
    }

    if keys.is_empty() {
        return Err(CryptError::NoValidKeys { role });
    }

    Ok(KeyLoad { keys, rejected })
}

/// Load exactly one public key from a file.
pub fn load_public_key(path: &Path) -> Result<Key> {
    load_key_file(path, KeyRole::Public).map_err(|cause| CryptError::KeyLoad {
        path: path.to_path_buf(),
        cause,
    })
}

/// Write a freshly generated key pair to disk as PEM files.
///
/// Refuses to overwrite existing files.  The private key file is created
/// owner-only on Unix.  Returns the generated private key.
pub fn generate_key_pair(private_path: &Path, public_path: &Path) -> Result<Key> {
    for path in [private_path, public_path] {
        if path.exists() {
            return Err(CryptError::CommandFailed(format!(
                "refusing to overwrite existing file {}",
                path.display()
            )));
        }
    }

    let private = Key::generate();
    let public = private.public_key();

    write_key_file(private_path, &private.to_pem()?, true)?;
    write_key_file(public_path, &public.to_pem()?, false)?;

    Ok(private)
}

fn write_key_file(path: &Path, contents: &str, owner_only: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if owner_only {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = owner_only;

    let mut file = options.open(path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => CryptError::CommandFailed(format!(
            "refusing to overwrite existing file {}",
            path.display()
        )),
        _ => CryptError::Io(e),
    })?;
    file.write_all(contents.as_bytes())?;

    Ok(())
}

fn expand_key_path(path: &Path) -> std::result::Result<Vec<PathBuf>, String> {
    let meta = fs::metadata(path).map_err(|e| e.to_string())?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| e.to_string())? {
        let entry_path = entry.map_err(|e| e.to_string())?.path();
        if entry_path.is_file() {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_key_file(path: &Path, role: KeyRole) -> std::result::Result<Key, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut key = Key::from_pem(&text).map_err(|e| match e {
        CryptError::Configuration(cause) => cause,
        other => other.to_string(),
    })?;

    if key.role != role {
        return Err(format!("expected a {role} key, found a {} key", key.role));
    }

    key.source = Some(path.to_path_buf());
    Ok(key)
}

// ---------------------------------------------------------------------------
// DER helpers
// ---------------------------------------------------------------------------

fn parse_private_der(der: &[u8]) -> Result<[u8; KEY_LEN]> {
    let info = PrivateKeyInfo::from_der(der)
        .map_err(|e| CryptError::Configuration(format!("not a PKCS#8 private key: {e}")))?;

    if info.algorithm.oid != X25519_OID {
        return Err(CryptError::Configuration(format!(
            "unsupported key algorithm {}",
            info.algorithm.oid
        )));
    }

    // RFC 8410: the PKCS#8 payload is itself an OCTET STRING.
    let inner = OctetStringRef::from_der(info.private_key)
        .map_err(|e| CryptError::Configuration(format!("malformed X25519 private key: {e}")))?;

    inner.as_bytes().try_into().map_err(|_| {
        CryptError::Configuration(format!(
            "X25519 private key must be {KEY_LEN} bytes, got {}",
            inner.as_bytes().len()
        ))
    })
}

fn parse_public_der(der: &[u8]) -> Result<[u8; KEY_LEN]> {
    let info = SubjectPublicKeyInfoRef::from_der(der)
        .map_err(|e| CryptError::Configuration(format!("not an SPKI public key: {e}")))?;

    if info.algorithm.oid != X25519_OID {
        return Err(CryptError::Configuration(format!(
            "unsupported key algorithm {}",
            info.algorithm.oid
        )));
    }

    let bytes = info.subject_public_key.as_bytes().ok_or_else(|| {
        CryptError::Configuration("public key bit string is not byte aligned".into())
    })?;

    bytes.try_into().map_err(|_| {
        CryptError::Configuration(format!(
            "X25519 public key must be {KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

fn encode_private_der(material: &[u8; KEY_LEN]) -> Result<Zeroizing<Vec<u8>>> {
    let inner = Zeroizing::new(
        OctetStringRef::new(material)
            .and_then(|octets| octets.to_der())
            .map_err(|e| CryptError::EncryptionFailed(format!("DER encoding failed: {e}")))?,
    );

    let info = PrivateKeyInfo {
        algorithm: AlgorithmIdentifierRef {
            oid: X25519_OID,
            parameters: None,
        },
        private_key: inner.as_slice(),
        public_key: None,
    };

    info.to_der()
        .map(Zeroizing::new)
        .map_err(|e| CryptError::EncryptionFailed(format!("DER encoding failed: {e}")))
}

fn encode_public_der(material: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let subject_public_key = BitStringRef::from_bytes(material)
        .map_err(|e| CryptError::EncryptionFailed(format!("DER encoding failed: {e}")))?;

    let info = SubjectPublicKeyInfoRef {
        algorithm: AlgorithmIdentifierRef {
            oid: X25519_OID,
            parameters: None,
        },
        subject_public_key,
    };

    info.to_der()
        .map_err(|e| CryptError::EncryptionFailed(format!("DER encoding failed: {e}")))
}
