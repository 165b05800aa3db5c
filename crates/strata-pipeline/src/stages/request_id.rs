//! Request ID stage.
//!
//! Gives every execution a stable identifier for log correlation and echoes
//! it back to the client in the `x-request-id` response header.
//!
//! ## Sources
//!
//! 1. **`x-request-id` header**: used only when the stage trusts incoming
//!    IDs and the header holds a valid UUID
//! 2. **Context ID**: the UUID v7 assigned when the context was created

use crate::context::Context;
use crate::stage::{BoxFuture, Flow, Stage};
use http::HeaderValue;
use strata_core::RequestId;
use uuid::Uuid;

/// The header used for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stage that assigns and echoes request IDs.
///
/// # Example
///
/// ```
/// use strata_pipeline::stages::RequestIdStage;
/// use strata_pipeline::Stage;
///
/// // Internal service: accept IDs assigned upstream.
/// let stage = RequestIdStage::trust_incoming();
/// assert_eq!(stage.name(), "request_id");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestIdStage {
    /// Whether to adopt a valid incoming `x-request-id`.
    ///
    /// Leave this off for traffic from outside the trust boundary.
    trust_incoming: bool,
}

impl RequestIdStage {
    /// Creates a stage that ignores incoming IDs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stage that adopts valid incoming IDs.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn incoming(&self, ctx: &Context) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }

        ctx.request()
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(RequestId::from_uuid)
    }
}

impl Stage for RequestIdStage {
    fn name(&self) -> &str {
        "request_id"
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            if let Some(request_id) = self.incoming(ctx) {
                ctx.set_request_id(request_id);
            }
            Ok(Flow::Continue)
        })
    }

    fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let value = HeaderValue::from_str(&ctx.request_id().to_string())?;
            if let Some(response) = ctx.response_mut() {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(())
        })
    }
}
