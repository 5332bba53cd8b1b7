//! Session token verification (compact HS256 tokens).
//!
//! This module is intentionally "core-only": it does not know about axum, cookies or
//! routes. The access engine calls `verify` once per request and decides what to do with
//! the failure.
//!
//! Wire format:
//! `b64url(header_json) "." b64url(payload_json) "." b64url(HMAC-SHA256(h "." p, secret))`

use std::sync::Once;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// The only signing algorithm we accept. Anything else (including `none`) is rejected
/// before the signature is looked at.
pub const SUPPORTED_ALG: &str = "HS256";

// Issuers differ on padding; accept both.
const B64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static UNSIGNED_WARNING: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("malformed session token")]
    MalformedToken,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("session token expired")]
    Expired,
    #[error("token issuer mismatch")]
    IssuerMismatch,
    #[error("bad token signature")]
    BadSignature,
}

/// Decoded payload of a session token.
///
/// `role` is kept as the raw string from the identity service; mapping it onto the
/// closed role set happens in `roles::Role::normalize`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    // seconds since epoch
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, rename = "iss")]
    pub issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    #[serde(default)]
    alg: Option<String>,
}

/// Verify a session token and return its claims.
///
/// - `secret`: HMAC key. Empty disables the signature check (logged once).
/// - `expected_issuer`: when set, `iss` must match exactly.
/// - `now`: verification time; `exp` must not be before it.
pub fn verify(
    token: &str,
    secret: &str,
    expected_issuer: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Claims, VerificationFailure> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
        return Err(VerificationFailure::MalformedToken);
    };

    let header: TokenHeader = decode_json(header_b64)?;
    let claims: Claims = decode_json(payload_b64)?;

    match header.alg.as_deref() {
        Some(alg) if alg.eq_ignore_ascii_case(SUPPORTED_ALG) => {}
        _ => return Err(VerificationFailure::UnsupportedAlgorithm),
    }

    if let Some(exp) = claims.exp {
        if exp.saturating_mul(1000) < now.timestamp_millis() {
            return Err(VerificationFailure::Expired);
        }
    }

    if let Some(expected) = expected_issuer {
        if claims.issuer.as_deref() != Some(expected) {
            return Err(VerificationFailure::IssuerMismatch);
        }
    }

    if secret.is_empty() {
        UNSIGNED_WARNING.call_once(|| {
            warn!("no session secret configured; token signatures are NOT being verified");
        });
        return Ok(claims);
    }

    let provided = B64URL
        .decode(signature_b64)
        .map_err(|_| VerificationFailure::BadSignature)?;
    let expected = sign_segments(header_b64, payload_b64, secret)?;

    if !constant_time_eq(&expected, &provided) {
        return Err(VerificationFailure::BadSignature);
    }

    Ok(claims)
}

fn decode_json<T: DeserializeOwned>(segment: &str) -> Result<T, VerificationFailure> {
    let bytes = B64URL
        .decode(segment)
        .map_err(|_| VerificationFailure::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| VerificationFailure::MalformedToken)
}

fn sign_segments(
    header_b64: &str,
    payload_b64: &str,
    secret: &str,
) -> Result<Vec<u8>, VerificationFailure> {
    // HMAC accepts keys of any length, so this only fails on an impossible key size.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationFailure::BadSignature)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Length-checked comparison that touches every byte regardless of where the first
/// difference is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
