//! # Webhook Signatures
//!
//! Vercel signs every delivery with HMAC-SHA1 over the raw request body using
//! the secret returned when the webhook was registered. The signature header
//! carries `sha1=<lowercase hex digest>`.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Prefix of every signature header value
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Signature verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature secret cannot be used as an HMAC key")]
    InvalidSecret,

    #[error("Signature does not match the request body")]
    Mismatch,
}

/// Compute the expected signature header value for a raw body
pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();

    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Verify a provided signature header against the raw body
///
/// The comparison runs in constant time over the full header value, so a
/// missing prefix or wrong case fails the same way as a wrong digest.
pub fn verify_signature(secret: &str, body: &[u8], provided: &str) -> Result<(), SignatureError> {
    let expected = compute_signature(secret, body)?;

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
