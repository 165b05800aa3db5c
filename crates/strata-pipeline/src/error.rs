//! Pipeline error types.
//!
//! Two families of errors exist:
//!
//! - [`ConfigurationError`] surfaces synchronously from registration calls.
//! - [`StageError`] surfaces from execution. It names the stage that failed,
//!   the [`Phase`] it failed in and the original cause. A failing branch
//!   predicate produces a `StageError` with [`Phase::Predicate`] under the
//!   branch's name; it unwinds exactly like any other stage failure.

use thiserror::Error;

/// Errors raised while building a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Registration was attempted after the pipeline was sealed.
    #[error("pipeline `{pipeline}` is sealed; cannot register `{stage}`")]
    Sealed {
        /// The pipeline name.
        pipeline: String,
        /// The rejected stage or branch name.
        stage: String,
    },

    /// A stage or branch has an empty name.
    #[error("pipeline `{pipeline}` rejected a stage with an empty name")]
    EmptyName {
        /// The pipeline name.
        pipeline: String,
    },

    /// Registration would exceed the configured stage limit.
    #[error("pipeline `{pipeline}` is limited to {max} stages; `{stage}` would make {attempted}")]
    TooManyStages {
        /// The pipeline name.
        pipeline: String,
        /// The rejected stage or branch name.
        stage: String,
        /// The configured limit.
        max: usize,
        /// The count the registration would have produced.
        attempted: usize,
    },
}

/// The hook a [`StageError`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pre-logic, on the way in.
    Before,
    /// Post-logic, on the way out.
    After,
    /// Branch predicate evaluation.
    Predicate,
    /// A trap stage's recovery hook.
    Recover,
}

impl Phase {
    /// Returns the phase name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Predicate => "predicate",
            Self::Recover => "recover",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by a stage during execution.
///
/// # Example
///
/// ```
/// use strata_pipeline::{Phase, StageError};
///
/// let error = StageError::new("auth", Phase::Before, anyhow::anyhow!("token expired"));
/// assert_eq!(error.stage(), "auth");
/// assert_eq!(error.to_string(), "stage `auth` failed during before: token expired");
/// ```
#[derive(Debug, Error)]
#[error("stage `{stage}` failed during {phase}: {cause}")]
pub struct StageError {
    stage: String,
    phase: Phase,
    #[source]
    cause: anyhow::Error,
}

impl StageError {
    /// Creates a stage error.
    pub fn new(stage: impl Into<String>, phase: Phase, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            stage: stage.into(),
            phase,
            cause: cause.into(),
        }
    }

    /// Creates the error raised when a branch predicate fails.
    pub fn predicate(branch: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self::new(branch, Phase::Predicate, cause)
    }

    /// Attributes a hook failure to a stage.
    ///
    /// A cause that already is a `StageError` passes through unchanged, which
    /// is how a trap stage re-raises the error it was handed.
    pub(crate) fn attribute(stage: &str, phase: Phase, cause: anyhow::Error) -> Self {
        match cause.downcast::<StageError>() {
            Ok(existing) => existing,
            Err(cause) => Self::new(stage, phase, cause),
        }
    }

    /// Name of the stage (or branch) that failed.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The hook the failure was raised from.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether this failure came from a branch predicate.
    #[must_use]
    pub fn is_predicate_failure(&self) -> bool {
        self.phase == Phase::Predicate
    }

    /// The original cause.
    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Returns the cause downcast to `T`, searching the cause chain.
    #[must_use]
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        self.cause
            .downcast_ref::<T>()
            .or_else(|| self.cause.chain().find_map(|err| err.downcast_ref::<T>()))
    }

    /// Consumes the error, returning the original cause.
    #[must_use]
    pub fn into_cause(self) -> anyhow::Error {
        self.cause
    }
}
