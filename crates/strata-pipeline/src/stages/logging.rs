//! Structured request logging.
//!
//! Emits one `info` event when a request enters the pipeline and one when
//! it leaves, correlated by request ID.
//!
//! | Field | Event |
//! |---|---|
//! | `request_id` | both |
//! | `method`, `path` | both |
//! | `status` | out |
//! | `duration_ms` | out |

use crate::context::Context;
use crate::stage::{BoxFuture, Flow, Stage};
use std::time::Instant;

/// Stage that logs each request on the way in and out.
#[derive(Debug, Clone, Default)]
pub struct LoggingStage {
    _private: (),
}

/// Entry time recorded by [`LoggingStage`].
#[derive(Debug, Clone, Copy)]
struct EnteredAt(Instant);

impl LoggingStage {
    /// Creates a logging stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            ctx.set_extension(EnteredAt(Instant::now()));
            tracing::info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = ctx.path(),
                "request started"
            );
            Ok(Flow::Continue)
        })
    }

    fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let duration_ms = ctx
                .remove_extension::<EnteredAt>()
                .map_or(0, |EnteredAt(at)| at.elapsed().as_millis() as u64);
            let status = ctx.response().map_or(0, |response| response.status().as_u16());

            tracing::info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = ctx.path(),
                status,
                duration_ms,
                "request finished"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::empty_request;

    #[tokio::test]
    async fn test_logging_is_transparent() {
        let stage = LoggingStage::new();
        let mut ctx = Context::new(empty_request("/orders"));

        assert_eq!(stage.before(&mut ctx).await.unwrap(), Flow::Continue);
        assert!(ctx.has_extension::<EnteredAt>());

        stage.after(&mut ctx).await.unwrap();
        assert!(!ctx.has_extension::<EnteredAt>());
        assert!(ctx.response().is_none());
    }
}
