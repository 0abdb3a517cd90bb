//! Cryptographic core of crypttool.
//!
//! This module provides:
//! - X25519 key loading, fingerprints and generation (`keys`)
//! - The text-safe envelope format (`envelope`)
//! - Hybrid X25519 + AES-256-GCM encryption (`hybrid`)
//! - Context-bound sessions used by every caller (`session`)

pub mod envelope;
pub mod hybrid;
pub mod keys;
pub mod session;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{CipherSession, Key, load_keys, ...};
pub use envelope::Envelope;
pub use keys::{generate_key_pair, load_keys, load_public_key, Fingerprint, Key, KeyLoad, KeyRole};
pub use session::CipherSession;
