//! Identity resolution: external SSO identity → stable local user.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use forms_core::{ExternalIdentity, StoreError, StoreResult, User, UserId};

/// The slice of the user store the trust boundary depends on.
///
/// Implementations must be safe for concurrent use and must enforce
/// uniqueness of `handle` (the external id).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user for `external_id`, or update the mutable profile fields of
    /// the existing one. `None` leaves the stored value untouched.
    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<User>;

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<User> {
        (**self).upsert_by_external_id(external_id, email, name).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        (**self).find_by_external_id(external_id).await
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        (**self).find_by_id(id).await
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity has no external id")]
    MissingExternalId,

    #[error("failed to persist user: {0}")]
    Persistence(#[source] StoreError),
}

/// Map a validated external identity to a local user, creating it on first
/// login.
///
/// Idempotent: every call for the same external id converges on one record
/// with one stable id. Losing an insert race to a concurrent first login shows
/// up as a uniqueness violation and is resolved by reading the winner's row.
#[tracing::instrument(skip_all, fields(external_id = identity.external_id().unwrap_or("")))]
pub async fn ensure_user<S>(store: &S, identity: &ExternalIdentity) -> Result<User, IdentityError>
where
    S: UserStore + ?Sized,
{
    let external_id = identity
        .external_id()
        .ok_or(IdentityError::MissingExternalId)?;

    let result = store
        .upsert_by_external_id(
            external_id,
            identity.email.as_deref(),
            identity.display_name.as_deref(),
        )
        .await;

    match result {
        Ok(user) => Ok(user),
        Err(StoreError::UniqueViolation(detail)) => {
            tracing::debug!(%detail, "lost first-login race, re-fetching user");
            store
                .find_by_external_id(external_id)
                .await
                .map_err(IdentityError::Persistence)?
                .ok_or_else(|| {
                    IdentityError::Persistence(StoreError::UniqueViolation(detail))
                })
        }
        Err(e) => Err(IdentityError::Persistence(e)),
    }
}
