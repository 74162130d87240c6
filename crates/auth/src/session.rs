//! Stateless, tamper-evident session tokens.
//!
//! Token format (text): `<payload_b64url>.<tag_b64url>`
//! - payload is the JSON encoding of [`Session`]
//! - tag is `HMAC-SHA256(secret, payload bytes)`
//!
//! Nothing is stored server-side. A token is valid as long as its tag matches
//! and `expires` lies in the future.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the serialized session.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Seven days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub fn default_session_ttl() -> Duration {
    Duration::seconds(DEFAULT_SESSION_TTL_SECS)
}

/// A logged-in session: who, and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    expires: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session id must not be empty")]
    EmptyId,

    #[error("session ttl must be positive")]
    NonPositiveTtl,

    #[error("session token is not of the form <payload>.<tag>")]
    InvalidFormat,

    #[error("session token tag does not match its payload")]
    TamperedOrInvalid,

    #[error("session payload could not be decoded")]
    Malformed,

    #[error("session has expired")]
    Expired,

    #[error("failed to encode session: {0}")]
    Encode(String),
}

impl Session {
    /// Start a session for `id` lasting `ttl` from now.
    pub fn create(id: impl Into<String>, ttl: Duration) -> Result<Self, SessionError> {
        Self::create_at(id, ttl, Utc::now())
    }

    /// Deterministic variant of [`Session::create`].
    pub fn create_at(
        id: impl Into<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SessionError::EmptyId);
        }
        if ttl <= Duration::zero() {
            return Err(SessionError::NonPositiveTtl);
        }
        Ok(Self {
            id,
            expires: now + ttl,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Signs and verifies session tokens with a process-wide secret.
///
/// Cheap to clone; the secret is shared and never leaves this type.
#[derive(Clone)]
pub struct SessionCodec {
    secret: Arc<[u8]>,
}

impl core::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret)
    }

    /// Serialize and sign a session into its cookie value.
    pub fn serialize(&self, session: &Session) -> Result<String, SessionError> {
        let payload =
            serde_json::to_vec(session).map_err(|e| SessionError::Encode(e.to_string()))?;

        let mut mac = self.mac().map_err(|e| SessionError::Encode(e.to_string()))?;
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Verify a token and return the session it carries.
    pub fn parse(&self, raw: &str) -> Result<Session, SessionError> {
        self.parse_at(raw, Utc::now())
    }

    /// Deterministic variant of [`SessionCodec::parse`].
    ///
    /// The tag is checked before the payload is decoded, so untrusted JSON is
    /// never parsed.
    pub fn parse_at(&self, raw: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let (payload_b64, tag_b64) = split_token(raw).ok_or_else(|| {
            tracing::debug!("session token rejected: wrong number of segments");
            SessionError::InvalidFormat
        })?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected: payload is not base64url");
            SessionError::InvalidFormat
        })?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected: tag is not base64url");
            SessionError::InvalidFormat
        })?;

        let mut mac = self.mac().map_err(|_| SessionError::TamperedOrInvalid)?;
        mac.update(&payload);
        // `verify_slice` compares in constant time.
        mac.verify_slice(&tag).map_err(|_| {
            tracing::debug!("session token rejected: tag mismatch");
            SessionError::TamperedOrInvalid
        })?;

        let session: Session = serde_json::from_slice(&payload).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected: payload is not a session");
            SessionError::Malformed
        })?;
        if session.id.is_empty() {
            tracing::debug!("session token rejected: empty id");
            return Err(SessionError::Malformed);
        }

        if session.is_expired_at(now) {
            tracing::debug!(expires = %session.expires, "session token rejected: expired");
            return Err(SessionError::Expired);
        }

        Ok(session)
    }
}

fn split_token(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.split('.');
    let payload = parts.next()?;
    let tag = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((payload, tag))
}
