//! Metric names and label keys.
//!
//! The engine emits these and the telemetry crate describes them, so both
//! sides agree on spelling.

/// Counter of executions, labelled by `pipeline` and `outcome`.
pub const EXECUTIONS_TOTAL: &str = "strata_pipeline_executions_total";

/// Histogram of execution wall time in seconds, labelled by `pipeline`.
pub const EXECUTION_DURATION_SECONDS: &str = "strata_pipeline_execution_duration_seconds";

/// Counter of stage failures, labelled by `pipeline`, `stage` and `phase`.
pub const STAGE_FAILURES_TOTAL: &str = "strata_pipeline_stage_failures_total";

/// Counter of faults absorbed by trap stages, labelled by `pipeline` and `stage`.
pub const RECOVERIES_TOTAL: &str = "strata_pipeline_recoveries_total";

/// Metric label keys.
pub mod labels {
    /// Pipeline name.
    pub const PIPELINE: &str = "pipeline";
    /// Execution outcome (`completed`, `terminated`, `faulted`).
    pub const OUTCOME: &str = "outcome";
    /// Stage name.
    pub const STAGE: &str = "stage";
    /// Stage phase (`before`, `after`, `predicate`, `recover`).
    pub const PHASE: &str = "phase";
}

