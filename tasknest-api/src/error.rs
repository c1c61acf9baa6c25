/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; library errors convert into
/// it through `From`, so `?` does the mapping.
///
/// Every error body has the same shape:
///
/// ```json
/// { "error": "not_found", "message": "Task not found" }
/// ```
///
/// `error` is a stable discriminant; `message` is for humans. Internal
/// details are logged and never returned.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tasknest_shared::auth::authorization::AuthzError;
use tasknest_shared::auth::middleware::AuthError;
use tasknest_shared::directory::DirectoryError;
use tasknest_shared::store::query::QueryError;
use tasknest_shared::store::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. a stale `expected_version`
    Conflict(String),

    /// Email already registered (400)
    DuplicateEmail,

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded(RateLimitInfo),

    /// Storage backend unavailable or slow (500)
    StorageError(String),

    /// Internal server error (500)
    InternalError(String),

    /// Not implemented (501)
    NotImplemented(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Admission state reported on 429 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds when the oldest counted request leaves the window
    pub reset_time: i64,
    /// Seconds to wait, at least 1
    pub retry_after: u64,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Present on 429 responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_info: Option<RateLimitInfo>,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    pub fn task_not_found() -> Self {
        ApiError::NotFound("Task not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::StorageError(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Stable discriminant used in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::DuplicateEmail => "duplicate_email",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::RateLimitExceeded(_) => "rate_limit_exceeded",
            ApiError::StorageError(_) => "storage_error",
            ApiError::InternalError(_) => "internal_error",
            ApiError::NotImplemented(_) => "not_implemented",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::DuplicateEmail => write!(f, "Email already registered"),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded(info) => write!(
                f,
                "Rate limit exceeded: retry after {} seconds",
                info.retry_after
            ),
            ApiError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let mut rate_info = None;

        let (message, details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotImplemented(msg) => (msg, None),
            ApiError::DuplicateEmail => ("Email already registered".to_string(), None),
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::RateLimitExceeded(info) => {
                rate_info = Some(info);
                (
                    format!(
                        "Rate limit exceeded. Try again in {} seconds",
                        info.retry_after
                    ),
                    None,
                )
            }
            ApiError::StorageError(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (
                    "Storage is temporarily unavailable, please retry later".to_string(),
                    None,
                )
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            details,
            rate_info,
        });

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();

        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let Some(info) = rate_info {
            insert_rate_headers(headers, &info);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after));
        }

        response
    }
}

/// Writes `X-RateLimit-*` headers
pub fn insert_rate_headers(headers: &mut axum::http::HeaderMap, info: &RateLimitInfo) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_time));
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidScheme => ApiError::Unauthorized("Expected Bearer token".to_string()),
            AuthError::Token(e) => ApiError::Unauthorized(e.to_string()),
            AuthError::UnknownUser => ApiError::Unauthorized("User not found".to_string()),
            AuthError::TokenRevoked => {
                ApiError::Unauthorized("Token has been revoked or expired".to_string())
            }
            AuthError::InactiveUser => ApiError::Forbidden("User account is inactive".to_string()),
            AuthError::Directory(e) => e.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::OwnerMismatch => {
                ApiError::Forbidden("Not authorized to access this user's resources".to_string())
            }
            AuthzError::MissingCapability(capability) => {
                ApiError::Forbidden(format!("Missing required capability: {}", capability))
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::VersionConflict { expected, actual } => ApiError::Conflict(format!(
                "Task was modified concurrently: expected version {}, current version {}",
                expected, actual
            )),
            StoreError::Unavailable(_) | StoreError::Timeout => {
                ApiError::StorageError(err.to_string())
            }
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateEmail => ApiError::DuplicateEmail,
            DirectoryError::WeakPassword(msg) => ApiError::invalid("password", msg),
            DirectoryError::Password(e) => {
                ApiError::InternalError(format!("Password operation failed: {}", e))
            }
            DirectoryError::Store(e) => e.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::invalid(err.field(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::invalid("body", e.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(e) => {
                ApiError::invalid("query", e.body_text())
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => ApiError::BadRequest(e.body_text()),
            other => ApiError::InternalError(other.body_text()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}
