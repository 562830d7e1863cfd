//! Keyed XOR transform with base64 framing.
//!
//! All functions are pure. The transform is byte-oriented: multi-byte UTF-8
//! characters are obfuscated byte by byte, so the ciphertext of a non-ASCII
//! message is longer than its character count suggests.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::TransformError;

/// Text shown in place of a message whose ciphertext cannot be decoded.
pub const DECRYPTION_FAILED_TEXT: &str = "Decryption failed. Invalid message or key.";

/// Obfuscate `plaintext` under `key`.
///
/// # Errors
///
/// - `InvalidKey`: `key` is empty
pub fn transform(plaintext: &[u8], key: &[u8]) -> Result<String, TransformError> {
    if key.is_empty() {
        return Err(TransformError::InvalidKey);
    }

    let mut buf = plaintext.to_vec();
    apply_keystream(&mut buf, key);
    Ok(STANDARD.encode(buf))
}

/// Recover the bytes hidden in `ciphertext` under `key`.
///
/// A wrong key is not detected: the output is deterministic but generally
/// meaningless. Callers treat that as a normal outcome.
///
/// # Errors
///
/// - `InvalidKey`: `key` is empty
/// - `MalformedCiphertext`: `ciphertext` is not valid standard base64
pub fn invert(ciphertext: &str, key: &[u8]) -> Result<Vec<u8>, TransformError> {
    if key.is_empty() {
        return Err(TransformError::InvalidKey);
    }

    let mut buf = STANDARD.decode(ciphertext)?;
    apply_keystream(&mut buf, key);
    Ok(buf)
}

/// XOR `buf` in place with `key` repeated to its length.
pub(crate) fn apply_keystream(buf: &mut [u8], key: &[u8]) {
    debug_assert!(!key.is_empty());

    for (byte, k) in buf.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}
