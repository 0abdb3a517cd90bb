//! Text-safe serialization of encrypted secrets.
//!
//! An envelope string looks like:
//!
//! ```text
//! v1:<base64( wrapped_key (80 bytes) | nonce (12 bytes) | sealed_payload (>= 16 bytes) )>
//! ```
//!
//! Only letters, digits and `v : + / =` appear, so the string can sit in a
//! YAML or JSON field without quoting problems.  Unknown versions are
//! refused instead of guessed at.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{CryptError, Result};

/// Current envelope format version.
pub const CURRENT_VERSION: u8 = 1;

/// Ephemeral X25519 public key (32) + AES-GCM sealed 32-byte key (32 + 16 tag).
pub const WRAPPED_KEY_LEN: usize = 80;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length; the smallest possible sealed payload.
pub const TAG_LEN: usize = 16;

const BODY_MIN_LEN: usize = WRAPPED_KEY_LEN + NONCE_LEN + TAG_LEN;

/// The fields of an encrypted secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u8,
    pub wrapped_key: [u8; WRAPPED_KEY_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub sealed_payload: Vec<u8>,
}

impl Envelope {
    /// Serialize to the `v<version>:<base64>` text form.
    pub fn encode(&self) -> String {
        let mut body = Vec::with_capacity(WRAPPED_KEY_LEN + NONCE_LEN + self.sealed_payload.len());
        body.extend_from_slice(&self.wrapped_key);
        body.extend_from_slice(&self.nonce);
        body.extend_from_slice(&self.sealed_payload);

        format!("v{}:{}", self.version, BASE64.encode(body))
    }

    /// Parse the text form.  Never panics, whatever the input.
    pub fn decode(text: &str) -> Result<Self> {
        let text = text.trim_matches(|c: char| c.is_ascii_whitespace());

        let (tag, body) = text
            .split_once(':')
            .ok_or_else(|| CryptError::CorruptEnvelope("missing version separator".into()))?;

        let version = parse_version_tag(tag)?;
        if version != CURRENT_VERSION {
            return Err(CryptError::UnsupportedVersion(version));
        }

        let body = BASE64
            .decode(body)
            .map_err(|e| CryptError::CorruptEnvelope(format!("invalid base64: {e}")))?;

        if body.len() < BODY_MIN_LEN {
            return Err(CryptError::CorruptEnvelope(format!(
                "envelope body is {} bytes, expected at least {BODY_MIN_LEN}",
                body.len()
            )));
        }

        let (wrapped_key, rest) = body.split_at(WRAPPED_KEY_LEN);
        let (nonce, sealed_payload) = rest.split_at(NONCE_LEN);

        Ok(Self {
            version,
            wrapped_key: wrapped_key
                .try_into()
                .map_err(|_| CryptError::CorruptEnvelope("bad wrapped key length".into()))?,
            nonce: nonce
                .try_into()
                .map_err(|_| CryptError::CorruptEnvelope("bad nonce length".into()))?,
            sealed_payload: sealed_payload.to_vec(),
        })
    }
}

/// `v` followed by one to three decimal digits, value fitting a `u8`.
fn parse_version_tag(tag: &str) -> Result<u8> {
    let digits = tag
        .strip_prefix('v')
        .filter(|d| {
            !d.is_empty()
                && d.len() <= 3
                && d.bytes().all(|b| b.is_ascii_digit())
                && (d.len() == 1 || !d.starts_with('0'))
        })
        .ok_or_else(|| CryptError::CorruptEnvelope(format!("malformed version tag '{tag}'")))?;

    digits
        .parse()
        .map_err(|_| CryptError::CorruptEnvelope(format!("malformed version tag '{tag}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            version: CURRENT_VERSION,
            wrapped_key: [0x11; WRAPPED_KEY_LEN],
            nonce: [0x22; NONCE_LEN],
            sealed_payload: vec![0x33; 40],
        }
    }

    #[test]
    fn encode_then_decode_preserves_fields() {
        let env = sample();
        let text = env.encode();
        assert!(text.starts_with("v1:"));
        assert_eq!(Envelope::decode(&text).unwrap(), env);
    }

    #[test]
    fn encoded_form_is_text_safe() {
        let text = sample().encode();
        assert!(text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '+' | '/' | '=')));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let text = format!("  {}\n", sample().encode());
        assert_eq!(Envelope::decode(&text).unwrap(), sample());
    }

    #[test]
    fn unknown_version_is_refused() {
        let text = sample().encode().replacen("v1:", "v2:", 1);
        assert!(matches!(
            Envelope::decode(&text),
            Err(CryptError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn malformed_tags_are_corrupt() {
        let body = sample().encode()[3..].to_string();
        for tag in ["", "v", "1", "x1", "v1a", "v999", "v1000", "v01", "v001", "v00"] {
            let text = format!("{tag}:{body}");
            assert!(
                matches!(Envelope::decode(&text), Err(CryptError::CorruptEnvelope(_))),
                "tag {tag:?} should be corrupt"
            );
        }
    }

    #[test]
    fn missing_separator_is_corrupt() {
        assert!(matches!(
            Envelope::decode("v1AAAA"),
            Err(CryptError::CorruptEnvelope(_))
        ));
    }

    #[test]
    fn bad_base64_is_corrupt() {
        assert!(matches!(
            Envelope::decode("v1:not*base64"),
            Err(CryptError::CorruptEnvelope(_))
        ));
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let text = sample().encode();
        // Drop enough characters to fall under the fixed-size prefix.
        let short = format!("v1:{}", BASE64.encode([0u8; BODY_MIN_LEN - 1]));
        assert!(matches!(
            Envelope::decode(&short),
            Err(CryptError::CorruptEnvelope(_))
        ));
        // Losing a character breaks the base64 itself.
        assert!(matches!(
            Envelope::decode(&text[..text.len() - 1]),
            Err(CryptError::CorruptEnvelope(_))
        ));
    }

    #[test]
    fn decode_never_panics_on_junk() {
        for junk in ["", ":", "v1:", "v1:=", "v255:AAAA", "\u{1F600}:\u{1F600}", "v1:\u{0}"] {
            let _ = Envelope::decode(junk);
        }
    }
}
