//! Error boundary stage.
//!
//! A trap stage that turns any fault raised by the stages it wraps into the
//! standard error envelope:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "ERROR_CODE",
//!     "message": "Human-readable error message",
//!     "request_id": "uuid-v7-request-id"
//!   }
//! }
//! ```
//!
//! A fault caused by a [`Rejection`] keeps the rejection's status and code.
//! Every other fault becomes `500 INTERNAL_ERROR`. Messages of internal
//! faults are replaced with a generic one unless explicitly exposed.
//!
//! # Example
//!
//! ```
//! use strata_pipeline::stages::ErrorBoundary;
//! use strata_pipeline::Stage;
//!
//! // Development: show internal failure messages to clients.
//! let boundary = ErrorBoundary::new().expose_internal_errors(true);
//! assert!(boundary.is_trap());
//! ```

use crate::context::Context;
use crate::error::StageError;
use crate::stage::{BoxFuture, Stage};
use http::StatusCode;
use strata_core::{Rejection, RejectionKind, Response, ResponseExt};

/// Trap stage that converts faults into JSON error responses.
#[derive(Debug, Clone)]
pub struct ErrorBoundary {
    /// Whether to expose internal error details.
    expose_internal_errors: bool,
    /// Message shown in place of hidden internal errors.
    internal_error_message: String,
}

/// The error an [`ErrorBoundary`] rendered, stored in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    /// The error code.
    pub code: String,
    /// The message sent to the client.
    pub message: String,
    /// The HTTP status code.
    pub status_code: u16,
    /// The stage that raised the fault.
    pub stage: String,
    /// Whether the fault was internal.
    pub was_internal: bool,
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBoundary {
    /// Creates an error boundary that hides internal error details.
    #[must_use]
    pub fn new() -> Self {
        Self {
            expose_internal_errors: false,
            internal_error_message: "An internal error occurred".to_string(),
        }
    }

    /// Sets whether to expose internal error details.
    ///
    /// **Warning**: Only enable this in development environments.
    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Sets the message shown in place of hidden internal errors.
    #[must_use]
    pub fn internal_error_message(mut self, message: &str) -> Self {
        self.internal_error_message = message.to_string();
        self
    }

    fn normalize(&self, error: &StageError) -> (StatusCode, NormalizedError) {
        let (kind, detail) = match error.downcast_ref::<Rejection>() {
            Some(rejection) => (rejection.kind(), rejection.message().to_string()),
            None => (RejectionKind::Internal, error.cause().to_string()),
        };
        let was_internal = !kind.is_client_facing();
        let message = if was_internal && !self.expose_internal_errors {
            self.internal_error_message.clone()
        } else {
            detail
        };

        let normalized = NormalizedError {
            code: kind.code().to_string(),
            message,
            status_code: kind.status().as_u16(),
            stage: error.stage().to_string(),
            was_internal,
        };
        (kind.status(), normalized)
    }
}

impl Stage for ErrorBoundary {
    fn name(&self) -> &str {
        "error_boundary"
    }

    fn is_trap(&self) -> bool {
        true
    }

    fn recover<'a>(
        &'a self,
        ctx: &'a mut Context,
        error: StageError,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let (status, normalized) = self.normalize(&error);
            let request_id = ctx.request_id().to_string();

            if normalized.was_internal {
                tracing::error!(
                    request_id = %request_id,
                    stage = error.stage(),
                    phase = %error.phase(),
                    error = ?error.cause(),
                    "internal error"
                );
            } else {
                tracing::debug!(
                    request_id = %request_id,
                    stage = error.stage(),
                    code = %normalized.code,
                    "request rejected"
                );
            }

            ctx.set_response(Response::json_error(
                status,
                &normalized.code,
                &normalized.message,
                Some(&request_id),
            ));
            ctx.set_extension(normalized);
            Ok(())
        })
    }
}
