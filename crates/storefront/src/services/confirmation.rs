//! Email confirmation tokens.
//!
//! A token is `base64url(email).<unix seconds>.<hex hmac>` where the HMAC is
//! SHA-256 keyed by the session secret over
//! `email-confirmation:<email>.<unix seconds>`. Tokens expire after an hour.
//! Nothing is stored server-side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use fnuc_core::Email;

use super::stripe::constant_time_compare;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a confirmation token, in seconds.
pub const TOKEN_MAX_AGE_SECS: i64 = 3600;

const SALT: &str = "email-confirmation";

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed confirmation token")]
    Malformed,
    #[error("confirmation token signature mismatch")]
    BadSignature,
    #[error("confirmation token expired")]
    Expired,
    #[error("invalid signing key")]
    InvalidKey,
}

fn sign(secret: &[u8], email: &str, timestamp: i64) -> Result<String, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(format!("{SALT}:{email}.{timestamp}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Issue a token for `email` at `now`.
///
/// # Errors
///
/// Returns `TokenError::InvalidKey` if the secret cannot key the HMAC.
pub fn generate(secret: &[u8], email: &Email, now: DateTime<Utc>) -> Result<String, TokenError> {
    let timestamp = now.timestamp();
    Ok(format!(
        "{}.{timestamp}.{}",
        URL_SAFE_NO_PAD.encode(email.as_str()),
        sign(secret, email.as_str(), timestamp)?
    ))
}

/// Check a token and return the address it confirms.
///
/// # Errors
///
/// Returns a [`TokenError`] if the token is malformed, forged or older than
/// [`TOKEN_MAX_AGE_SECS`].
pub fn verify(secret: &[u8], token: &str, now: DateTime<Utc>) -> Result<Email, TokenError> {
    let mut parts = token.split('.');
    let (Some(encoded), Some(timestamp), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| TokenError::Malformed)?;
    let address = String::from_utf8(raw).map_err(|_| TokenError::Malformed)?;
    let timestamp: i64 = timestamp.parse().map_err(|_| TokenError::Malformed)?;

    let expected = sign(secret, &address, timestamp)?;
    if !constant_time_compare(&expected, signature) {
        return Err(TokenError::BadSignature);
    }

    let age = now.timestamp() - timestamp;
    if !(0..=TOKEN_MAX_AGE_SECS).contains(&age) {
        return Err(TokenError::Expired);
    }

    Email::parse(&address).map_err(|_| TokenError::Malformed)
}
