//! The stage trait and closure-based stages.
//!
//! A [`Stage`] is one layer of the onion. The engine calls [`Stage::before`]
//! on the way in and [`Stage::after`] on the way out, so stages registered
//! first wrap stages registered later.
//!
//! # Example
//!
//! ```ignore
//! use strata_pipeline::{BoxFuture, Context, Flow, Stage};
//!
//! struct Timing;
//!
//! impl Stage for Timing {
//!     fn name(&self) -> &str {
//!         "timing"
//!     }
//!
//!     fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
//!         Box::pin(async move {
//!             ctx.set_extension(std::time::Instant::now());
//!             Ok(Flow::Continue)
//!         })
//!     }
//!
//!     fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
//!         Box::pin(async move {
//!             if let Some(started) = ctx.get_extension::<std::time::Instant>() {
//!                 tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "done");
//!             }
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::context::Context;
use crate::error::StageError;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Continuation decision returned from [`Stage::before`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Delegate to the next stage.
    Continue,
    /// Short-circuit: enter no further stage and start unwinding here.
    Stop,
}

/// One unit of pipeline behavior.
///
/// # Invariants
///
/// - `before` runs at most once per execution.
/// - `after` runs only if `before` ran, and only after every stage entered
///   later has finished its own `after`.
/// - A stage that fails does not see its own `after` run unless a trap
///   stage was entered before it.
pub trait Stage: Send + Sync + 'static {
    /// Returns the name of this stage.
    ///
    /// Used as the stage's identity in errors, traces, logs and metrics.
    fn name(&self) -> &str;

    /// Pre-logic, invoked on the way in.
    ///
    /// Returning [`Flow::Stop`] (or calling [`Context::terminate`]) prevents
    /// every later stage from being entered.
    fn before<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async { Ok(Flow::Continue) })
    }

    /// Post-logic, invoked on the way out.
    fn after<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Whether this stage is an error boundary.
    ///
    /// Only trap stages have [`Stage::recover`] called.
    fn is_trap(&self) -> bool {
        false
    }

    /// Trap post-logic, invoked instead of [`Stage::after`] while a fault is
    /// unwinding.
    ///
    /// Returning `Ok` absorbs the fault: the stage may have rewritten the
    /// context (typically its response) and earlier stages run their normal
    /// post-logic. Returning the error (or a new one) re-raises it toward the
    /// next enclosing trap.
    fn recover<'a>(
        &'a self,
        _ctx: &'a mut Context,
        error: StageError,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { Err(error.into()) })
    }
}

type BeforeFn = Box<dyn Fn(&mut Context) -> anyhow::Result<Flow> + Send + Sync>;
type AfterFn = Box<dyn Fn(&mut Context) -> anyhow::Result<()> + Send + Sync>;
type RecoverFn = Box<dyn Fn(&mut Context, StageError) -> anyhow::Result<()> + Send + Sync>;

/// A stage assembled from synchronous closures.
///
/// Handy for small stages and tests. Stages that need to await I/O should
/// implement [`Stage`] directly.
///
/// # Example
///
/// ```
/// use strata_pipeline::{FnStage, Flow, Stage};
///
/// let stage = FnStage::new("auth")
///     .before(|ctx| {
///         if ctx.request().headers().contains_key("authorization") {
///             Ok(Flow::Continue)
///         } else {
///             Ok(Flow::Stop)
///         }
///     })
///     .after(|_ctx| Ok(()));
///
/// assert_eq!(stage.name(), "auth");
/// assert!(!stage.is_trap());
/// ```
pub struct FnStage {
    name: String,
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
    recover: Option<RecoverFn>,
}

impl FnStage {
    /// Creates a stage with no hooks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
            recover: None,
        }
    }

    /// Sets the pre-logic closure.
    #[must_use]
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<Flow> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    /// Sets the post-logic closure.
    #[must_use]
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    /// Sets the recovery closure and marks the stage as a trap.
    #[must_use]
    pub fn recover<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context, StageError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.recover = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for FnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("trap", &self.recover.is_some())
            .finish()
    }
}

impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        let result = self.before.as_ref().map_or(Ok(Flow::Continue), |f| f(ctx));
        Box::pin(async move { result })
    }

    fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
        let result = self.after.as_ref().map_or(Ok(()), |f| f(ctx));
        Box::pin(async move { result })
    }

    fn is_trap(&self) -> bool {
        self.recover.is_some()
    }

    fn recover<'a>(
        &'a self,
        ctx: &'a mut Context,
        error: StageError,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let result = match &self.recover {
            Some(f) => f(ctx, error),
            None => Err(error.into()),
        };
        Box::pin(async move { result })
    }
}
