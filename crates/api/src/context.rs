//! Per-request identity.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use forms_core::{User, UserId};

use crate::errors::ApiError;

/// The user a request is acting as.
///
/// Only the session gate can attach one (the constructor is crate-private),
/// so a handler that extracts `CurrentUser` runs only for authenticated
/// requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(User);

impl CurrentUser {
    pub(crate) fn new(user: User) -> Self {
        Self(user)
    }

    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn user(&self) -> &User {
        &self.0
    }

    pub fn into_user(self) -> User {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            tracing::error!(uri = %parts.uri, "CurrentUser extracted on a route without the session gate");
            ApiError::unauthorized("Not logged in.")
        })
    }
}
