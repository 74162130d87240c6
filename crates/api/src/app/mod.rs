//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP handlers (one file per area)
//! - [`AppState`]: what every handler and the session gate share

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use axum::{Router, routing::get};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use url::Url;

use forms_auth::{SessionCodec, UserStore};
use forms_infra::{AppConfig, CasClient, CasError};

use crate::{errors, middleware};

pub mod routes;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cas(#[from] CasError),

    #[error("frontend origin {0:?} is not a valid header value")]
    FrontendOrigin(String),
}

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub codec: SessionCodec,
    pub users: Arc<dyn UserStore>,
    pub cas: CasClient,
    /// Where the browser lands after login, with or without error parameters.
    pub frontend_url: Url,
    pub secure_cookies: bool,
    frontend_origin: HeaderValue,
}

impl AppState {
    pub fn new(
        codec: SessionCodec,
        users: Arc<dyn UserStore>,
        cas: CasClient,
        frontend_url: Url,
        secure_cookies: bool,
    ) -> Result<Self, AppError> {
        let origin = frontend_url.origin().ascii_serialization();
        let frontend_origin =
            HeaderValue::from_str(&origin).map_err(|_| AppError::FrontendOrigin(origin))?;

        Ok(Self {
            codec,
            users,
            cas,
            frontend_url,
            secure_cookies,
            frontend_origin,
        })
    }

    pub fn from_config(config: &AppConfig, users: Arc<dyn UserStore>) -> Result<Self, AppError> {
        let cas = CasClient::new(
            config.cas_endpoints(),
            config.cas_timeout,
            config.tls_certs_path.as_deref(),
        )?;
        Self::new(
            config.session_codec(),
            users,
            cas,
            config.frontend_url.clone(),
            config.secure_cookies(),
        )
    }
}

fn cors(state: &AppState) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(state.frontend_origin.clone())
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the full HTTP router. `base_url` is a path prefix (`""` or
/// `"/forms"`); the API lives under `{base_url}/api`.
pub fn build_app(state: AppState, base_url: &str) -> Router {
    let protected = Router::new()
        .route("/auth/info", get(routes::auth::info))
        .route("/users/:user_id", get(routes::users::get_user))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    let api = Router::new()
        .route("/auth/login", get(routes::auth::login))
        .route("/auth/login/callback", get(routes::auth::callback))
        .route("/auth/logout", get(routes::auth::logout))
        .merge(protected)
        .method_not_allowed_fallback(errors::method_not_allowed)
        .layer(cors(&state));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest(&format!("{base_url}/api"), api)
        .fallback(errors::fallback)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::log_requests)))
        .with_state(state)
}
