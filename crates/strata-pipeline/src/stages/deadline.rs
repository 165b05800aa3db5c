//! Deadline enforcement.
//!
//! Terminates an execution with `504 Gateway Timeout` once the context has
//! been alive longer than the configured budget. Place it after the stages
//! that may consume the budget and before the expensive ones.

use crate::context::Context;
use crate::stage::{BoxFuture, Flow, Stage};
use http::StatusCode;
use std::time::Duration;
use strata_core::{Response, ResponseExt};

/// Stage that terminates executions whose budget is spent.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use strata_pipeline::stages::DeadlineStage;
///
/// let stage = DeadlineStage::new(Duration::from_millis(250));
/// assert_eq!(stage.budget(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DeadlineStage {
    budget: Duration,
}

impl DeadlineStage {
    /// Creates a deadline stage with the given budget.
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Returns the budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }
}

impl Stage for DeadlineStage {
    fn name(&self) -> &str {
        "deadline"
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            let elapsed = ctx.elapsed();
            if elapsed <= self.budget {
                return Ok(Flow::Continue);
            }

            tracing::warn!(
                request_id = %ctx.request_id(),
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "deadline exceeded"
            );
            let request_id = ctx.request_id().to_string();
            ctx.terminate(Response::json_error(
                StatusCode::GATEWAY_TIMEOUT,
                "GATEWAY_TIMEOUT",
                "Request deadline exceeded",
                Some(&request_id),
            ));
            Ok(Flow::Stop)
        })
    }
}
