//! `forms-auth`: the authentication boundary (stateless sessions + SSO).
//!
//! This crate is intentionally decoupled from HTTP frameworks and storage
//! drivers: transports and stores plug in through plain values and the
//! [`UserStore`] trait.

pub mod identity;
pub mod session;
pub mod sso;

pub use identity::{IdentityError, UserStore, ensure_user};
pub use session::{
    DEFAULT_SESSION_TTL_SECS, SESSION_COOKIE_NAME, Session, SessionCodec, SessionError,
    default_session_ttl,
};
pub use sso::{CasEndpoints, CasServiceResponse, INVALID_TICKET, ValidationOutcome};
