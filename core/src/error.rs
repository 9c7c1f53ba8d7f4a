//! Error types for the API client.
//!
//! # Design
//! Status-driven variants carry the `Response` that triggered them so callers
//! can inspect headers (rate-limit counters, `Retry-After`) or the raw body.
//! `RateLimitExceeded` is a 403 distinguished only by
//! `X-RateLimit-Remaining: 0`; every other 403 lands in `Forbidden`.

use thiserror::Error;

use crate::http::Response;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by the request pipeline, storages and OAuth flow.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A `:name` placeholder in the URL path has no value.
    #[error("Missing parameter '{name}' for URL path '{path}'.")]
    MissingParameter { name: String, path: String },

    /// A `:name` placeholder is bound to a list or map.
    #[error("Parameter '{name}' for URL path '{path}' must be a scalar.")]
    InvalidParameter { name: String, path: String },

    /// The request body could not be encoded to JSON.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport could not complete the exchange.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The body is declared as JSON but is malformed or not an object/array.
    #[error("{message}")]
    InvalidResponse { message: String, response: Box<Response> },

    /// 400
    #[error("{message}")]
    BadRequest { message: String, response: Box<Response> },

    /// 401
    #[error("{message}")]
    Unauthorized { message: String, response: Box<Response> },

    /// 403 without an exhausted rate limit.
    #[error("{message}")]
    Forbidden { message: String, response: Box<Response> },

    /// 403 with `X-RateLimit-Remaining: 0`.
    #[error("{message}")]
    RateLimitExceeded { message: String, response: Box<Response> },

    /// 404
    #[error("{message}")]
    NotFound { message: String, response: Box<Response> },

    /// 422
    #[error("{message}")]
    UnprocessableEntity { message: String, response: Box<Response> },

    /// Any other status outside the accepted set.
    #[error("{message}")]
    UnexpectedResponse { message: String, response: Box<Response> },

    /// Misuse of the API, e.g. linking a predecessor response twice.
    #[error("{0}")]
    Logic(String),

    /// The OAuth login flow failed.
    #[error("{0}")]
    Login(String),

    /// The cache directory does not exist or cannot be created.
    #[error("{0}")]
    MissingDirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// The response this error was derived from, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::InvalidResponse { response, .. }
            | Self::BadRequest { response, .. }
            | Self::Unauthorized { response, .. }
            | Self::Forbidden { response, .. }
            | Self::RateLimitExceeded { response, .. }
            | Self::NotFound { response, .. }
            | Self::UnprocessableEntity { response, .. }
            | Self::UnexpectedResponse { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Status code of the underlying response, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(Response::code)
    }
}
