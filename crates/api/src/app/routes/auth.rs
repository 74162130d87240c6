//! CAS login flow and session endpoints.
//!
//! The browser-facing handlers here never answer with a JSON error: every
//! outcome of the callback is a `302`, either back into the handshake or to
//! the front-end (optionally carrying `error_code` / `error_message`).

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use forms_auth::{Session, ValidationOutcome, default_session_ttl, ensure_user};
use forms_core::User;

use crate::app::AppState;
use crate::context::CurrentUser;
use crate::cookies;
use crate::errors::ErrorCode;

const LOGIN_FAILED: &str = "An error occurred while logging you in. Please try again.";
const USER_FETCH_FAILED: &str = "Failed to fetch user details.";

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn redirect_with_error(state: &AppState, code: ErrorCode, message: &str) -> Response {
    let mut target = state.frontend_url.clone();
    target
        .query_pairs_mut()
        .append_pair("error_code", code.as_str())
        .append_pair("error_message", message);
    found(target.as_str())
}

/// `GET /auth/login`: hand the browser to the CAS login page.
pub async fn login(State(state): State<AppState>) -> Response {
    found(&state.cas.endpoints().login_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    ticket: Option<String>,
}

/// `GET /auth/login/callback?ticket=…`: redeem the ticket, resolve the local
/// user, issue the session cookie.
pub async fn callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
    jar: CookieJar,
) -> Response {
    let login_url = state.cas.endpoints().login_url();

    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable callback query; restarting login");
            return found(&login_url);
        }
    };
    let Some(ticket) = params
        .ticket
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return found(&login_url);
    };

    let identity = match state.cas.validate_ticket(ticket).await {
        Ok(ValidationOutcome::Validated(identity)) => identity,
        Ok(ValidationOutcome::InvalidTicket) => return found(&login_url),
        Ok(ValidationOutcome::MissingIdentity { code }) => {
            let code = code.unwrap_or_else(|| "UNKNOWN".to_string());
            tracing::warn!(cas_code = %code, "no user id in cas response");
            return redirect_with_error(
                &state,
                ErrorCode::Unauthorized,
                &format!("Failed to authorize due to the following CAS error: {code}."),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to validate cas ticket");
            return redirect_with_error(&state, ErrorCode::InternalServerError, LOGIN_FAILED);
        }
    };

    let user = match ensure_user(state.users.as_ref(), &identity).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "failed to upsert user");
            return redirect_with_error(&state, ErrorCode::InternalServerError, USER_FETCH_FAILED);
        }
    };

    let token = Session::create(user.id.to_string(), default_session_ttl())
        .and_then(|session| Ok((state.codec.serialize(&session)?, session.expires())));
    let (token, expires) = match token {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user.id, "failed to issue session");
            return redirect_with_error(&state, ErrorCode::InternalServerError, LOGIN_FAILED);
        }
    };

    tracing::info!(user_id = %user.id, "user logged in");
    let jar = jar.add(cookies::session_cookie(token, expires, state.secure_cookies));
    (jar, found(state.frontend_url.as_str())).into_response()
}

/// `GET /auth/logout`: drop the session cookie, then end the CAS session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let jar = jar.add(cookies::deletion_cookie(state.secure_cookies));
    (jar, found(&state.cas.endpoints().logout_url())).into_response()
}

/// `GET /auth/info`: the signed-in user's record.
pub async fn info(user: CurrentUser) -> Json<User> {
    Json(user.into_user())
}
