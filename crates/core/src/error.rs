//! Error model of the collaborating store.

use thiserror::Error;

/// Result type used by store adapters.
pub type StoreResult<T> = Result<T, StoreError>;

/// Resource-level denial decided by the store (ownership, grants, membership,
/// business rules such as a closed form).
///
/// Produced only by store adapters; the API boundary maps it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationHint {
    Forbidden,
    NotFound,
    FormClosed,
    /// Unrecognised tag; carries the raw value for logging.
    Other(String),
}

impl AuthorizationHint {
    /// Parse the wire tag a store attaches to an error (`forbidden`,
    /// `not-found`, `form-closed`).
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "forbidden" => Self::Forbidden,
            "not-found" => Self::NotFound,
            "form-closed" => Self::FormClosed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Forbidden => "forbidden",
            Self::NotFound => "not-found",
            Self::FormClosed => "form-closed",
            Self::Other(tag) => tag,
        }
    }
}

impl core::fmt::Display for AuthorizationHint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store operation error.
///
/// These are **infrastructure** outcomes as seen by the trust boundary.
/// `Denied` is the only variant whose message may reach a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the operation for a resource-level reason.
    #[error("{message}")]
    Denied {
        hint: AuthorizationHint,
        message: String,
    },

    /// A uniqueness constraint rejected an insert.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The store could not be reached or failed unexpectedly.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn denied(hint: AuthorizationHint, message: impl Into<String>) -> Self {
        Self::Denied {
            hint,
            message: message.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn hint(&self) -> Option<&AuthorizationHint> {
        match self {
            Self::Denied { hint, .. } => Some(hint),
            _ => None,
        }
    }
}
