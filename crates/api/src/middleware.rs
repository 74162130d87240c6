//! Request middleware: the session gate and the request logger.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use forms_auth::SESSION_COOKIE_NAME;
use forms_core::UserId;

use crate::app::AppState;
use crate::context::CurrentUser;
use crate::errors::ApiError;

/// Admit the request only with a valid session for an existing user.
///
/// 1. no `session` cookie → 401 "Not logged in."
/// 2. token fails verification (any reason) → 401 "Invalid session."
/// 3. session id names no user → 401 "Invalid user."
/// 4. otherwise attach [`CurrentUser`] and run the handler.
///
/// A store failure during the lookup is an internal error; the request is
/// never let through.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = jar
        .get(SESSION_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("Not logged in."))?
        .value();

    let session = state
        .codec
        .parse(raw)
        .map_err(|_| ApiError::unauthorized("Invalid session."))?;

    let user_id: UserId = session
        .id()
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid user."))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("Invalid user."))?;

    req.extensions_mut().insert(CurrentUser::new(user));
    Ok(next.run(req).await)
}

/// One log line per request; `error` level for 5xx, `debug` otherwise.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();

    let start = Instant::now();
    let response = next.run(req).await;
    let latency = start.elapsed();
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(status, %method, %endpoint, %uri, ?latency, "processed request");
    } else {
        tracing::debug!(status, %method, %endpoint, %uri, ?latency, "processed request");
    }

    response
}
