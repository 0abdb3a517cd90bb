//! Context-bound cipher session.
//!
//! A `CipherSession` ties one context (the owning record's name) to the keys
//! allowed to encrypt and decrypt for it.  It borrows the keys, so a key set
//! loaded once can back any number of sessions, including across threads.

use zeroize::Zeroizing;

use super::envelope::Envelope;
use super::hybrid;
use super::keys::{Key, KeyRole};
use crate::errors::{CryptError, Result};

/// Encrypts and decrypts secrets for a single context.
#[derive(Debug, Clone)]
pub struct CipherSession<'k> {
    context: String,
    private_keys: &'k [Key],
    public_key: Option<&'k Key>,
}

impl<'k> CipherSession<'k> {
    /// Build a session.  Every entry of `private_keys` must be a private key
    /// and `public_key` must be a public key.
    pub fn new(
        context: impl Into<String>,
        private_keys: &'k [Key],
        public_key: Option<&'k Key>,
    ) -> Result<Self> {
        if let Some(key) = private_keys.iter().find(|k| k.role() != KeyRole::Private) {
            return Err(CryptError::Configuration(format!(
                "key {} was supplied for decryption but is not a private key",
                key.fingerprint()
            )));
        }
        if let Some(key) = public_key.filter(|k| k.role() != KeyRole::Public) {
            return Err(CryptError::Configuration(format!(
                "key {} was supplied for encryption but is not a public key",
                key.fingerprint()
            )));
        }

        Ok(Self {
            context: context.into(),
            private_keys,
            public_key,
        })
    }

    /// Session that can only decrypt.
    pub fn for_decryption(context: impl Into<String>, private_keys: &'k [Key]) -> Result<Self> {
        Self::new(context, private_keys, None)
    }

    /// Session that can only encrypt.
    pub fn for_encryption(context: impl Into<String>, public_key: &'k Key) -> Result<Self> {
        Self::new(context, &[], Some(public_key))
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Encrypt `plaintext` into an envelope string bound to this context.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let public_key = self.public_key.ok_or_else(|| {
            CryptError::Configuration("no public key configured for encryption".into())
        })?;

        let envelope = hybrid::seal(plaintext, public_key, &self.context)?;
        Ok(envelope.encode())
    }

    /// Decrypt an envelope string.  The returned buffer is wiped on drop;
    /// keep it alive no longer than needed.
    pub fn decrypt(&self, envelope: &str) -> Result<Zeroizing<Vec<u8>>> {
        if self.private_keys.is_empty() {
            return Err(CryptError::Configuration(
                "no private keys configured for decryption".into(),
            ));
        }

        let envelope = Envelope::decode(envelope)?;
        hybrid::open(&envelope, self.private_keys, &self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_requires_public_key() {
        let keys = vec![Key::generate()];
        let session = CipherSession::for_decryption("paas", &keys).unwrap();
        assert!(matches!(
            session.encrypt(b"data"),
            Err(CryptError::Configuration(_))
        ));
    }

    #[test]
    fn decrypt_requires_private_keys() {
        let public = Key::generate().public_key();
        let session = CipherSession::for_encryption("paas", &public).unwrap();
        let envelope = session.encrypt(b"data").unwrap();

        assert!(matches!(
            session.decrypt(&envelope),
            Err(CryptError::Configuration(_))
        ));
    }

    #[test]
    fn decrypt_without_keys_checks_configuration_before_parsing() {
        let session = CipherSession::new("paas", &[], None).unwrap();
        assert!(matches!(
            session.decrypt("garbage"),
            Err(CryptError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_keys_in_the_wrong_role() {
        let private = Key::generate();
        let public = private.public_key();

        let as_private = vec![public.clone()];
        assert!(CipherSession::for_decryption("paas", &as_private).is_err());
        assert!(CipherSession::for_encryption("paas", &private).is_err());
    }

    #[test]
    fn context_is_exposed() {
        let session = CipherSession::new("team-paas", &[], None).unwrap();
        assert_eq!(session.context(), "team-paas");
    }
}
