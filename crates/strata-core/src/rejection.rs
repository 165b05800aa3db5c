//! Typed stage failures.
//!
//! Stages fail with any error type, but a [`Rejection`] additionally tells
//! an error boundary which status and code to put on the response.
//!
//! | `RejectionKind` | Status | Code |
//! |---|---|---|
//! | `BadRequest` | 400 | `BAD_REQUEST` |
//! | `Unauthorized` | 401 | `UNAUTHORIZED` |
//! | `Forbidden` | 403 | `FORBIDDEN` |
//! | `NotFound` | 404 | `NOT_FOUND` |
//! | `Conflict` | 409 | `CONFLICT` |
//! | `TooManyRequests` | 429 | `RATE_LIMITED` |
//! | `Internal` | 500 | `INTERNAL_ERROR` |
//! | `Unavailable` | 503 | `SERVICE_UNAVAILABLE` |
//! | `Timeout` | 504 | `GATEWAY_TIMEOUT` |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Malformed or invalid input.
    BadRequest,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Caller is known but not allowed.
    Forbidden,
    /// Resource does not exist.
    NotFound,
    /// Concurrent modification or state conflict.
    Conflict,
    /// Rate limit exceeded.
    TooManyRequests,
    /// Unexpected failure inside the service.
    Internal,
    /// A dependency is unavailable.
    Unavailable,
    /// A deadline elapsed.
    Timeout,
}

impl RejectionKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns the machine-readable error code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::TooManyRequests => "RATE_LIMITED",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unavailable => "SERVICE_UNAVAILABLE",
            Self::Timeout => "GATEWAY_TIMEOUT",
        }
    }

    /// Whether messages of this kind may be shown to clients.
    #[must_use]
    pub const fn is_client_facing(self) -> bool {
        !matches!(self, Self::Internal | Self::Unavailable)
    }
}

/// A stage failure that carries its own response classification.
///
/// # Example
///
/// ```
/// use strata_core::{Rejection, RejectionKind};
///
/// let rejection = Rejection::unauthorized("missing credentials");
/// assert_eq!(rejection.kind(), RejectionKind::Unauthorized);
/// assert_eq!(rejection.status().as_u16(), 401);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({}): {message}", .kind.code(), .kind.status())]
pub struct Rejection {
    kind: RejectionKind,
    message: String,
}

impl Rejection {
    /// Creates a rejection of the given kind.
    #[must_use]
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `BadRequest` rejection.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::BadRequest, message)
    }

    /// Creates an `Unauthorized` rejection.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Unauthorized, message)
    }

    /// Creates a `Forbidden` rejection.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Forbidden, message)
    }

    /// Creates a `NotFound` rejection.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::NotFound, message)
    }

    /// Creates an `Internal` rejection.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Internal, message)
    }

    /// Creates a `Timeout` rejection.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Timeout, message)
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> RejectionKind {
        self.kind
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status for this rejection.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.kind.status()
    }
}
