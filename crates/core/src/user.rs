//! Local user record and the identity released by the SSO service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Attributes released by the SSO service for one authenticated principal.
///
/// Each attribute is optional: upstream sends lists and only the first element
/// (if any) is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl ExternalIdentity {
    /// The external id, if present and non-blank.
    pub fn external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// A local user, keyed by the SSO external id (`handle`).
///
/// The store owns this record; the trust boundary only needs `id` to issue
/// and re-validate sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
