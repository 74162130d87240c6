//! External service clients/adapters.

pub mod cas;
