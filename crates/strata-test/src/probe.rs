//! Journaling probe stages.
//!
//! A [`Probe`] records every hook it runs into a [`Journal`] as
//! `"<name>.before"`, `"<name>.after"` or `"<name>.recover"`, then behaves
//! as configured.

use crate::journal::Journal;
use http::StatusCode;
use std::time::Duration;
use strata_core::{Rejection, Response, ResponseExt};
use strata_pipeline::{BoxFuture, Context, Flow, Stage, StageError};

/// How a trap probe treats the fault it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapMode {
    /// Absorb the fault and write a `500` response naming the failed stage.
    Recover,
    /// Pass the fault on unchanged.
    Reraise,
}

#[derive(Debug, Clone)]
enum Action {
    Pass,
    ShortCircuit,
    Respond(StatusCode),
    Terminate(StatusCode),
    Fail(String),
    Reject(Rejection),
}

/// A configurable stage for pipeline tests.
///
/// # Example
///
/// ```
/// use strata_test::{Journal, Probe, TrapMode};
/// use strata_pipeline::Stage;
///
/// let journal = Journal::new();
/// let boundary = Probe::new("boundary", &journal).trap(TrapMode::Recover);
/// let handler = Probe::new("handler", &journal).fail_before("database unavailable");
///
/// assert!(boundary.is_trap());
/// assert!(!handler.is_trap());
/// ```
#[derive(Debug, Clone)]
pub struct Probe {
    name: String,
    journal: Journal,
    action: Action,
    fail_after: Option<String>,
    trap: Option<TrapMode>,
    delay: Option<Duration>,
}

impl Probe {
    /// Creates a probe that passes through.
    #[must_use]
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            action: Action::Pass,
            fail_after: None,
            trap: None,
            delay: None,
        }
    }

    /// Returns [`Flow::Stop`] from `before`.
    #[must_use]
    pub fn short_circuit(mut self) -> Self {
        self.action = Action::ShortCircuit;
        self
    }

    /// Writes a response in `before` and continues.
    #[must_use]
    pub fn respond(mut self, status: StatusCode) -> Self {
        self.action = Action::Respond(status);
        self
    }

    /// Terminates the context in `before`.
    #[must_use]
    pub fn terminate(mut self, status: StatusCode) -> Self {
        self.action = Action::Terminate(status);
        self
    }

    /// Fails `before` with `message`.
    #[must_use]
    pub fn fail_before(mut self, message: impl Into<String>) -> Self {
        self.action = Action::Fail(message.into());
        self
    }

    /// Fails `before` with a [`Rejection`].
    #[must_use]
    pub fn reject(mut self, rejection: Rejection) -> Self {
        self.action = Action::Reject(rejection);
        self
    }

    /// Fails `after` with `message`.
    #[must_use]
    pub fn fail_after(mut self, message: impl Into<String>) -> Self {
        self.fail_after = Some(message.into());
        self
    }

    /// Makes the probe a trap stage.
    #[must_use]
    pub fn trap(mut self, mode: TrapMode) -> Self {
        self.trap = Some(mode);
        self
    }

    /// Sleeps for `delay` at the start of `before`.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn entry(&self, hook: &str) -> String {
        format!("{}.{hook}", self.name)
    }
}

impl Stage for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async move {
            self.journal.record(self.entry("before"));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.action {
                Action::Pass => Ok(Flow::Continue),
                Action::ShortCircuit => Ok(Flow::Stop),
                Action::Respond(status) => {
                    ctx.set_response(Response::text(*status, &self.name));
                    Ok(Flow::Continue)
                }
                Action::Terminate(status) => {
                    ctx.terminate(Response::text(*status, &self.name));
                    Ok(Flow::Continue)
                }
                Action::Fail(message) => Err(anyhow::anyhow!("{message}")),
                Action::Reject(rejection) => Err(rejection.clone().into()),
            }
        })
    }

    fn after<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.journal.record(self.entry("after"));
            match &self.fail_after {
                Some(message) => Err(anyhow::anyhow!("{message}")),
                None => Ok(()),
            }
        })
    }

    fn is_trap(&self) -> bool {
        self.trap.is_some()
    }

    fn recover<'a>(
        &'a self,
        ctx: &'a mut Context,
        error: StageError,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.journal.record(self.entry("recover"));
            match self.trap {
                Some(TrapMode::Recover) => {
                    let body = format!("recovered {}", error.stage());
                    ctx.set_response(Response::text(StatusCode::INTERNAL_SERVER_ERROR, &body));
                    Ok(())
                }
                Some(TrapMode::Reraise) | None => Err(error.into()),
            }
        })
    }
}
