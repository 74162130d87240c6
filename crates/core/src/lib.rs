//! `forms-core`: shared building blocks for the forms trust boundary.
//!
//! This crate contains **pure** types (no HTTP, no storage drivers): identifiers,
//! the user record, the external identity released by SSO, and the error model
//! the collaborating store speaks.

pub mod error;
pub mod id;
pub mod user;

pub use error::{AuthorizationHint, StoreError, StoreResult};
pub use id::UserId;
pub use user::{ExternalIdentity, User};
