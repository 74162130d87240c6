//! Uniform client-facing errors.
//!
//! Every failure leaving the API is rendered as
//! `{"error": {"code": "<code>", "message": "<message>"}}` with the status
//! that belongs to the code. Internal failures are logged in full and reach
//! the client only as a generic message.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forms_core::{AuthorizationHint, StoreError};

pub const INTERNAL_ERROR_MESSAGE: &str =
    "An error occurred on the server side while processing your request. Please report this error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    AlreadyExists,
    InvalidRange,
    RateLimited,
    FormClosed,
    InternalServerError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::InvalidRange => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::FormClosed => StatusCode::FORBIDDEN,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::InvalidRange => "invalid-range",
            Self::RateLimited => "rate-limited",
            Self::FormClosed => "form-closed",
            Self::InternalServerError => "internal-server-error",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let code = match tag {
            "bad-request" => Self::BadRequest,
            "unauthorized" => Self::Unauthorized,
            "forbidden" => Self::Forbidden,
            "not-found" => Self::NotFound,
            "already-exists" => Self::AlreadyExists,
            "invalid-range" => Self::InvalidRange,
            "rate-limited" => Self::RateLimited,
            "form-closed" => Self::FormClosed,
            "internal-server-error" => Self::InternalServerError,
            _ => return None,
        };
        Some(code)
    }

    /// Code for a store denial. Unknown tags have no client-facing code.
    pub fn from_hint(hint: &AuthorizationHint) -> Option<Self> {
        match hint {
            AuthorizationHint::Forbidden => Some(Self::Forbidden),
            AuthorizationHint::NotFound => Some(Self::NotFound),
            AuthorizationHint::FormClosed => Some(Self::FormClosed),
            AuthorizationHint::Other(tag) => Self::from_tag(tag.trim()),
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpError {
    pub code: ErrorCode,
    pub message: String,
}

/// Response body wrapper; `error` is omitted on success bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HttpError>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// A failure whose code and message are meant for the client.
    #[error("{code}: {message}")]
    Client { code: ErrorCode, message: String },

    /// Anything else. Logged, never shown.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Client {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Client { code, .. } => *code,
            Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if let StoreError::Denied { hint, message } = &err {
            if let Some(code) = ErrorCode::from_hint(hint) {
                return Self::new(code, message.clone());
            }
        }
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::Client { code, message } => (code, message),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "unhandled error while serving request");
                (ErrorCode::InternalServerError, INTERNAL_ERROR_MESSAGE.to_string())
            }
        };

        let body = ErrorEnvelope {
            error: Some(HttpError { code, message }),
        };
        (code.status(), Json(body)).into_response()
    }
}

/// Handler for requests that match no route.
pub async fn fallback(method: Method) -> ApiError {
    ApiError::not_found(format!("Cannot {method} this endpoint."))
}

/// Handler for known paths requested with a method they do not serve.
pub async fn method_not_allowed(method: Method) -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        ApiError::new(ErrorCode::BadRequest, format!("Cannot {method} this endpoint.")),
    )
}
