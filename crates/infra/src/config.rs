//! Configuration loading and representation.
//!
//! Built once at startup from the environment and handed to the components
//! that need it. Nothing reads configuration lazily at request time.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use forms_auth::{CasEndpoints, SessionCodec};

const DEV_SESSION_SECRET: &str = "quis-custodiet-ipsos-custodes";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid port: {value:?}")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} is not a valid number of seconds: {value:?}")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("{var} is not a valid absolute url ({value:?}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("FORMS_SESSION_SECRET must be set to a non-default value in production")]
    InsecureSessionSecret,
}

/// Process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub production: bool,

    pub host: String,
    pub port: u16,
    /// Public origin of this server; its scheme decides the cookie `Secure` flag.
    pub domain: Url,
    /// Path prefix every route is mounted under (empty for none).
    pub base_url: String,

    /// `None` selects the in-memory user store.
    pub database_uri: Option<String>,
    pub frontend_url: Url,

    pub cas_base_url: String,
    pub cas_service_url: String,
    pub cas_timeout: Duration,
    /// Extra PEM roots trusted for outbound TLS, on top of the built-in set.
    pub tls_certs_path: Option<PathBuf>,

    pub session_secret: String,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("production", &self.production)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("domain", &self.domain.as_str())
            .field("base_url", &self.base_url)
            .field("database_uri", &self.database_uri.as_ref().map(|_| "<set>"))
            .field("frontend_url", &self.frontend_url.as_str())
            .field("cas_base_url", &self.cas_base_url)
            .field("cas_service_url", &self.cas_service_url)
            .field("cas_timeout", &self.cas_timeout)
            .field("tls_certs_path", &self.tls_certs_path)
            .field("session_secret", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Just the `PRODUCTION` flag, for choosing the log format before the
    /// rest of the configuration is read.
    pub fn production_from_env() -> bool {
        parse_flag(std::env::var("PRODUCTION").ok())
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (tests use a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = parse_flag(lookup("PRODUCTION"));

        let host = lookup("FORMS_SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match lookup("FORMS_SERVER_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
                var: "FORMS_SERVER_PORT",
                value,
            })?,
            None => 8647,
        };

        let domain = parse_url(
            "FORMS_APP_DOMAIN",
            lookup("FORMS_APP_DOMAIN").unwrap_or_else(|| "http://localhost:8647".to_string()),
        )?;
        let base_url = normalize_base_url(lookup("FORMS_BASE_URL").unwrap_or_default());

        let database_uri = lookup("FORMS_DATABASE_URI").filter(|v| !v.trim().is_empty());
        let frontend_url = parse_url(
            "FORMS_FRONTEND_URL",
            lookup("FORMS_FRONTEND_URL").unwrap_or_else(|| "http://localhost:8648".to_string()),
        )?;

        // Validated but kept verbatim: CAS compares the service url byte-for-byte.
        let cas_base_url = lookup("FORMS_CAS_BASE_URL")
            .unwrap_or_else(|| "https://login.iiit.ac.in/cas".to_string());
        parse_url("FORMS_CAS_BASE_URL", cas_base_url.clone())?;
        let cas_service_url = lookup("FORMS_CAS_SERVICE_URL")
            .unwrap_or_else(|| "http://localhost:8647/api/auth/login/callback".to_string());
        parse_url("FORMS_CAS_SERVICE_URL", cas_service_url.clone())?;
        let cas_timeout = match lookup("FORMS_CAS_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: "FORMS_CAS_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            None => Duration::from_secs(10),
        };
        let tls_certs_path = lookup("FORMS_TLS_CERTS_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let session_secret = match lookup("FORMS_SESSION_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None if production => return Err(ConfigError::InsecureSessionSecret),
            None => {
                tracing::warn!("FORMS_SESSION_SECRET not set; using insecure dev default");
                DEV_SESSION_SECRET.to_string()
            }
        };
        if production && session_secret == DEV_SESSION_SECRET {
            return Err(ConfigError::InsecureSessionSecret);
        }

        Ok(Self {
            production,
            host,
            port,
            domain,
            base_url,
            database_uri,
            frontend_url,
            cas_base_url,
            cas_service_url,
            cas_timeout,
            tls_certs_path,
            session_secret,
        })
    }

    /// Cookies are `Secure` iff the public domain is served over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.domain.scheme() == "https"
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cas_endpoints(&self) -> CasEndpoints {
        CasEndpoints::new(self.cas_base_url.clone(), self.cas_service_url.clone())
    }

    pub fn session_codec(&self) -> SessionCodec {
        SessionCodec::new(self.session_secret.as_bytes())
    }
}

fn parse_flag(value: Option<String>) -> bool {
    matches!(value.as_deref().map(str::trim), Some("true" | "1"))
}

fn parse_url(var: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
        value,
    })
}

/// `""`, `"/"` → `""`; `"forms/"` → `"/forms"`.
fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
