//! Session cookies.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

use forms_auth::SESSION_COOKIE_NAME;

fn base(value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

/// Cookie carrying a serialized session; expires together with the session.
pub fn session_cookie(token: String, expires: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let mut cookie = base(token, secure);
    if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
        cookie.set_expires(at);
    }
    cookie
}

/// Cookie that makes the browser drop its session.
pub fn deletion_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = base(String::new(), secure);
    cookie.set_max_age(time::Duration::ZERO);
    cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    cookie
}
