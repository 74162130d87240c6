//! HTTP API: the authentication flow, the session gate, and error mapping.

pub mod app;
pub mod context;
pub mod cookies;
pub mod errors;
pub mod middleware;
