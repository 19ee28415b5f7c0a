//! JSON response envelopes.
//!
//! Handlers return a [`SuccessResponse`] or fail with an [`HttpError`]; both
//! implement [`IntoResponse`], so they work directly as axum return types:
//!
//! ```
//! use backend_kit::response::{HttpError, SuccessResponse};
//! use serde_json::json;
//!
//! async fn get_user(id: u64) -> Result<SuccessResponse, HttpError> {
//!     if id == 0 {
//!         return Err(HttpError::not_found("user not found"));
//!     }
//!     Ok(SuccessResponse::ok("", json!({ "id": id })))
//! }
//! ```

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::error::KitError;

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// Successful response body: `{message, status, metadata, options?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse {
    /// Message; the status reason phrase when none was given
    pub message: String,
    /// HTTP status code
    pub status: u16,
    /// Payload
    pub metadata: Value,
    /// Extra options, only present on `created`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl SuccessResponse {
    /// Envelope with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, metadata: Value) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                reason(status).to_string()
            } else {
                message
            },
            status: status.as_u16(),
            metadata,
            options: None,
        }
    }

    /// `200 OK` envelope.
    #[must_use]
    pub fn ok(message: impl Into<String>, metadata: Value) -> Self {
        Self::new(StatusCode::OK, message, metadata)
    }

    /// `201 Created` envelope with empty options.
    #[must_use]
    pub fn created(message: impl Into<String>, metadata: Value) -> Self {
        Self::new(StatusCode::CREATED, message, metadata).with_options(json!({}))
    }

    /// Attach options.
    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Render with extra headers; they replace any header of the same name.
    #[must_use]
    pub fn send(self, headers: HeaderMap) -> Response {
        let mut response = self.into_response();
        response.headers_mut().extend(headers);
        response
    }
}

impl IntoResponse for SuccessResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Error categories and their HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400
    BadRequest,
    /// 401
    AuthFailure,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 406
    NotAcceptable,
    /// 408
    RequestTimeout,
    /// 409
    Conflict,
    /// 500, cache store failures
    CacheStore,
    /// 500, anything else
    Internal,
}

impl ErrorKind {
    /// HTTP status for this kind.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::AuthFailure => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Conflict => StatusCode::CONFLICT,
            Self::CacheStore | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default message: the status reason phrase.
    #[must_use]
    pub fn default_message(self) -> &'static str {
        reason(self.status_code())
    }
}

/// Error that renders as `{status, message}` with the matching status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error: {message}")]
pub struct HttpError {
    /// Category
    pub kind: ErrorKind,
    /// Message; the reason phrase when none was given
    pub message: String,
}

impl HttpError {
    /// Error of `kind`; an empty message falls back to the reason phrase.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                kind.default_message().to_string()
            } else {
                message
            },
            kind,
        }
    }

    /// 400
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// 401
    #[must_use]
    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailure, message)
    }

    /// 403
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// 404
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// 406
    #[must_use]
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAcceptable, message)
    }

    /// 408
    #[must_use]
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestTimeout, message)
    }

    /// 409
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// 500 for cache store failures.
    #[must_use]
    pub fn cache_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CacheStore, message)
    }

    /// HTTP status.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }
}

impl From<KitError> for HttpError {
    fn from(err: KitError) -> Self {
        let kind = match &err {
            KitError::InvalidInput(_) | KitError::WrongType { .. } | KitError::Serialization(_) => {
                ErrorKind::BadRequest
            }
            KitError::Timeout(_) => ErrorKind::RequestTimeout,
            KitError::NotConnected | KitError::Cache(_) => ErrorKind::CacheStore,
            KitError::Document(_) | KitError::Config(_) | KitError::Internal(_) => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "status": status.as_u16(), "message": self.message });
        (status, Json(body)).into_response()
    }
}
