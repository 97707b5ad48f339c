//! Stripe webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed
//! payload is `"{t}.{raw body}"`, keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,

    #[error("Malformed Stripe-Signature header")]
    Malformed,

    #[error("Webhook timestamp outside the tolerance window")]
    Expired,

    #[error("No matching v1 signature")]
    Mismatch,

    #[error("Webhook secret cannot be used as an HMAC key")]
    InvalidSecret,
}

/// MAC over `"{timestamp}.{payload}"` keyed with `secret`
fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex `v1` signature for `payload` signed at `timestamp`
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    Ok(hex::encode(signed_mac(secret, timestamp, payload)?.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is unix seconds. Returns the signed timestamp on success.
pub fn verify(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<i64, SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if now.abs_diff(timestamp) > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let mac = signed_mac(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());

    if matched {
        Ok(timestamp)
    } else {
        Err(SignatureError::Mismatch)
    }
}
