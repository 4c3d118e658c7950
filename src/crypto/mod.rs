//! Request Signing Module
//!
//! HMAC-SHA256 signatures for exchanges that require authenticated requests.
//! Every function here is pure. Secrets and signatures must never be logged.

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while signing a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignerError {
    /// Secret missing or blank; the exchange must be skipped
    #[error("signing secret is empty")]
    EmptySecret,
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

fn mac_bytes(secret: &str, payload: &str) -> Result<Vec<u8>, SignerError> {
    if secret.trim().is_empty() {
        return Err(SignerError::EmptySecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC-SHA256 of `payload`, lowercase hex encoded (Binance convention).
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, SignerError> {
    mac_bytes(secret, payload).map(hex::encode)
}

/// HMAC-SHA256 of `payload`, standard base64 encoded (Bitget convention).
pub fn hmac_sha256_base64(secret: &str, payload: &str) -> Result<String, SignerError> {
    mac_bytes(secret, payload).map(|bytes| general_purpose::STANDARD.encode(bytes))
}

/// Canonical prehash string for Bitget: `timestamp + METHOD + path [+ "?" + query] + body`.
pub fn bitget_prehash(timestamp: &str, method: &str, path: &str, query: &str, body: &str) -> String {
    let mut prehash = format!("{}{}{}", timestamp, method.to_uppercase(), path);
    if !query.is_empty() {
        prehash.push('?');
        prehash.push_str(query);
    }
    prehash.push_str(body);
    prehash
}
