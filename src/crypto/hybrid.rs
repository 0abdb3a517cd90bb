//! Hybrid encryption: X25519 key wrapping plus AES-256-GCM payload sealing.
//!
//! Sealing:
//! 1. Draw a fresh 256-bit data key and a fresh 96-bit nonce.
//! 2. Wrap the data key for the recipient: ephemeral X25519 exchange,
//!    HKDF-SHA256 to a key-encryption key, AES-256-GCM over the data key.
//! 3. Seal the plaintext under the data key with the context string as
//!    associated data.
//!
//! Opening walks the candidate private keys in order and stops at the first
//! one that both unwraps the data key and authenticates the payload.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::envelope::{Envelope, CURRENT_VERSION, NONCE_LEN, WRAPPED_KEY_LEN};
use super::keys::{Key, KeyRole, KEY_LEN};
use crate::errors::{CryptError, Result};

/// HKDF info label for key-encryption keys.
const KEK_INFO_LABEL: &[u8] = b"crypttool-kek-v1";

/// Every key-encryption key is used exactly once, so the wrap nonce is fixed.
const WRAP_NONCE: [u8; NONCE_LEN] = [0u8; NONCE_LEN];

/// Outcome of trying one private key against an envelope.
pub enum Attempt {
    /// The key could not unwrap the data key.
    KeyMismatch,
    /// The data key unwrapped but the payload (or its context) did not authenticate.
    AuthFailure,
    Success(Zeroizing<Vec<u8>>),
}

/// Encrypt `plaintext` for `public_key`, bound to `context`.
pub fn seal(plaintext: &[u8], public_key: &Key, context: &str) -> Result<Envelope> {
    if public_key.role() != KeyRole::Public {
        return Err(CryptError::Configuration(
            "encryption requires a public key".into(),
        ));
    }
    let recipient = public_key.x25519_public();

    let mut data_key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(data_key.as_mut());

    let wrapped_key = wrap_data_key(&data_key, &recipient)?;

    let cipher = Aes256Gcm::new_from_slice(data_key.as_ref())
        .map_err(|e| CryptError::EncryptionFailed(format!("invalid data key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed_payload = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: context.as_bytes(),
            },
        )
        .map_err(|e| CryptError::EncryptionFailed(format!("payload sealing failed: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);

    Ok(Envelope {
        version: CURRENT_VERSION,
        wrapped_key,
        nonce: nonce_bytes,
        sealed_payload,
    })
}

/// Decrypt `envelope` with the first of `private_keys` that opens it under
/// `context`.
///
/// Fails with [`CryptError::Decrypt`] carrying the number of keys tried when
/// none does.  Wrong key and wrong context are reported identically.
pub fn open(envelope: &Envelope, private_keys: &[Key], context: &str) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.version != CURRENT_VERSION {
        return Err(CryptError::UnsupportedVersion(envelope.version));
    }

    for (index, key) in private_keys.iter().enumerate() {
        match try_key(envelope, key, context) {
            Attempt::Success(plaintext) => {
                tracing::debug!(
                    attempt = index + 1,
                    fingerprint = %key.fingerprint(),
                    "secret decrypted"
                );
                return Ok(plaintext);
            }
            Attempt::KeyMismatch | Attempt::AuthFailure => {
                tracing::trace!(
                    attempt = index + 1,
                    fingerprint = %key.fingerprint(),
                    "key did not open envelope"
                );
            }
        }
    }

    Err(CryptError::Decrypt {
        attempts: private_keys.len(),
    })
}

/// Try a single private key.
pub fn try_key(envelope: &Envelope, key: &Key, context: &str) -> Attempt {
    let Some(secret) = key.x25519_secret() else {
        return Attempt::KeyMismatch;
    };

    let data_key = match unwrap_data_key(&envelope.wrapped_key, &secret) {
        Some(data_key) => data_key,
        None => return Attempt::KeyMismatch,
    };

    let Ok(cipher) = Aes256Gcm::new_from_slice(data_key.as_ref()) else {
        return Attempt::KeyMismatch;
    };

    let opened = cipher.decrypt(
        Nonce::from_slice(&envelope.nonce),
        Payload {
            msg: &envelope.sealed_payload,
            aad: context.as_bytes(),
        },
    );

    match opened {
        Ok(plaintext) => Attempt::Success(Zeroizing::new(plaintext)),
        Err(_) => Attempt::AuthFailure,
    }
}

/// `ephemeral_public (32) | AES-GCM(kek, data_key) (48)`.
fn wrap_data_key(
    data_key: &[u8; KEY_LEN],
    recipient: &X25519PublicKey,
) -> Result<[u8; WRAPPED_KEY_LEN]> {
    let mut seed = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(seed.as_mut());
    let ephemeral = StaticSecret::from(*seed);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(CryptError::EncryptionFailed(
            "public key is a low-order point".into(),
        ));
    }

    let kek = derive_kek(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes())?;
    let cipher = Aes256Gcm::new_from_slice(kek.as_ref())
        .map_err(|e| CryptError::EncryptionFailed(format!("invalid wrapping key: {e}")))?;
    let sealed_key = cipher
        .encrypt(Nonce::from_slice(&WRAP_NONCE), &data_key[..])
        .map_err(|e| CryptError::EncryptionFailed(format!("key wrapping failed: {e}")))?;

    if sealed_key.len() != WRAPPED_KEY_LEN - KEY_LEN {
        return Err(CryptError::EncryptionFailed(format!(
            "wrapped key has unexpected length {}",
            sealed_key.len()
        )));
    }

    let mut wrapped = [0u8; WRAPPED_KEY_LEN];
    wrapped[..KEY_LEN].copy_from_slice(ephemeral_public.as_bytes());
    wrapped[KEY_LEN..].copy_from_slice(&sealed_key);
    Ok(wrapped)
}

fn unwrap_data_key(
    wrapped: &[u8; WRAPPED_KEY_LEN],
    secret: &StaticSecret,
) -> Option<Zeroizing<Vec<u8>>> {
    let (ephemeral_bytes, sealed_key) = wrapped.split_at(KEY_LEN);
    let ephemeral_bytes: [u8; KEY_LEN] = ephemeral_bytes.try_into().ok()?;
    let ephemeral_public = X25519PublicKey::from(ephemeral_bytes);

    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return None;
    }

    let recipient = X25519PublicKey::from(secret);
    let kek = derive_kek(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes()).ok()?;
    let cipher = Aes256Gcm::new_from_slice(kek.as_ref()).ok()?;

    cipher
        .decrypt(Nonce::from_slice(&WRAP_NONCE), sealed_key)
        .ok()
        .map(Zeroizing::new)
}

/// HKDF-SHA256 over the shared secret, bound to both public keys.
fn derive_kek(
    shared: &[u8; KEY_LEN],
    ephemeral_public: &[u8; KEY_LEN],
    recipient_public: &[u8; KEY_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut info = Vec::with_capacity(KEK_INFO_LABEL.len() + 2 * KEY_LEN);
    info.extend_from_slice(KEK_INFO_LABEL);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(&info, okm.as_mut())
        .map_err(|e| CryptError::EncryptionFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}
