//! Infrastructure layer: configuration, user storage, external services.

pub mod config;
pub mod external;
pub mod users;

mod integration_tests;

pub use config::{AppConfig, ConfigError};
pub use external::cas::{CasClient, CasError};
pub use users::{InMemoryUserStore, PostgresUserStore};
