//! Room secret.
//!
//! The secret is both the room identifier and the transform key: two clients
//! holding the same secret are in the same room and can read each other.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    TransformError,
    transform::{apply_keystream, invert},
};

/// Domain separator for [`RoomKey::fingerprint`].
const FINGERPRINT_DOMAIN: &[u8] = b"secretchat room fingerprint v1";

/// Digest bytes kept in a fingerprint.
pub const FINGERPRINT_BYTES: usize = 6;

/// Validated, non-empty room secret.
///
/// Secret bytes are zeroized on drop. `Debug` is fully redacted; `Display`
/// prints the [`RoomKey::fingerprint`] and belongs in debug-level logs only.
#[derive(Clone, PartialEq, Eq, Hash, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RoomKey {
    secret: Vec<u8>,
}

impl RoomKey {
    /// Parse user input into a key.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// - `InvalidKey`: the trimmed input is empty
    pub fn parse(input: &str) -> Result<Self, TransformError> {
        Self::from_bytes(input.trim().as_bytes())
    }

    /// Key from raw secret bytes, taken verbatim.
    ///
    /// # Errors
    ///
    /// - `InvalidKey`: `secret` is empty
    pub fn from_bytes(secret: &[u8]) -> Result<Self, TransformError> {
        if secret.is_empty() {
            return Err(TransformError::InvalidKey);
        }
        Ok(Self { secret: secret.to_vec() })
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.secret
    }

    /// Transform a UTF-8 message under this key.
    pub fn seal(&self, plaintext: &str) -> String {
        let mut buf = plaintext.as_bytes().to_vec();
        apply_keystream(&mut buf, &self.secret);
        STANDARD.encode(buf)
    }

    /// Invert `ciphertext` under this key and decode the bytes as UTF-8.
    ///
    /// Invalid UTF-8 (the usual result of a wrong key) is replaced lossily
    /// rather than reported.
    ///
    /// # Errors
    ///
    /// - `MalformedCiphertext`: `ciphertext` is not valid base64
    pub fn open(&self, ciphertext: &str) -> Result<String, TransformError> {
        let bytes = invert(ciphertext, &self.secret)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Short label for correlating debug logs: the first
    /// [`FINGERPRINT_BYTES`] of a domain-separated SHA-256 of the secret,
    /// hex-encoded.
    ///
    /// Low-entropy secrets can be recovered from it by guessing, so it is not
    /// shown to users.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::new()
            .chain_update(FINGERPRINT_DOMAIN)
            .chain_update(&self.secret)
            .finalize();
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl TryFrom<Vec<u8>> for RoomKey {
    type Error = TransformError;

    fn try_from(secret: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(&secret)
    }
}

impl From<RoomKey> for Vec<u8> {
    fn from(key: RoomKey) -> Self {
        key.secret.clone()
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(<redacted>)")
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room:{}", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_whitespace() {
        let key = RoomKey::parse("  demo \n").unwrap();

        assert_eq!(key.as_bytes(), b"demo");
    }

    #[test]
    fn blank_input_is_invalid() {
        assert_eq!(RoomKey::parse("   "), Err(TransformError::InvalidKey));
        assert_eq!(RoomKey::from_bytes(b""), Err(TransformError::InvalidKey));
    }

    #[test]
    fn seal_matches_free_transform() {
        let key = RoomKey::parse("abc").unwrap();

        assert_eq!(key.seal("hi"), crate::transform(b"hi", b"abc").unwrap());
        assert_eq!(key.open(&key.seal("hi")).unwrap(), "hi");
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = RoomKey::parse("hunter2").unwrap();
        let rendered = format!("{key:?}");

        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains(&key.fingerprint()));
        assert_eq!(rendered, "RoomKey(<redacted>)");
    }

    #[test]
    fn fingerprint_is_truncated_domain_separated_sha256() {
        let key = RoomKey::parse("zq7k").unwrap();
        let bare = Sha256::digest(b"zq7k");

        let fingerprint = key.fingerprint();

        assert_eq!(fingerprint.len(), FINGERPRINT_BYTES * 2);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fingerprint, hex::encode(&bare[..FINGERPRINT_BYTES]));
        assert_eq!(format!("{key}"), format!("room:{fingerprint}"));
    }

    #[test]
    fn equal_secrets_are_the_same_room() {
        let a = RoomKey::parse("shared").unwrap();
        let b = RoomKey::parse(" shared ").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn wrong_key_open_is_lossy_not_error() {
        let sender = RoomKey::parse("right").unwrap();
        let reader = RoomKey::parse("wrong").unwrap();

        let opened = reader.open(&sender.seal("meet at noon")).unwrap();
        assert_ne!(opened, "meet at noon");
    }
}
