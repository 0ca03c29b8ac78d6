//! Access credential and its unverified expiry claim
//!
//! The expiry is read from the middle segment of the token for scheduling
//! only. The signature is never checked here and the claim is never used for
//! authorization decisions.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt;

/// Short-lived bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Unverified `exp` claim in epoch seconds
    pub fn expires_at(&self) -> Option<i64> {
        decode_expiry(&self.0)
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessCredential")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

impl From<String> for AccessCredential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for AccessCredential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Decode the `exp` claim (epoch seconds) from a three-segment token
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.as_object()?.get("exp")?;

    exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
}

/// Whether a credential should be renewed now.
///
/// Due when the remaining lifetime is at most `skew_secs`. A token whose
/// expiry cannot be decoded is always due.
pub fn renewal_due(token: &str, now_secs: i64, skew_secs: u64) -> bool {
    match decode_expiry(token) {
        Some(expires_at) => {
            let skew = i64::try_from(skew_secs).unwrap_or(i64::MAX);
            expires_at.saturating_sub(now_secs) <= skew
        }
        None => {
            debug!("credential expiry could not be decoded, treating as due");
            true
        }
    }
}
