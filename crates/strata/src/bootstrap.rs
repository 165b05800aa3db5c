//! Host bootstrap from a [`StrataConfig`].
//!
//! [`pipeline_builder`] returns a builder that already carries the built-in
//! stages the configuration asks for, outermost first:
//!
//! ```text
//! request-id → logging → error_boundary → [deadline] → host stages…
//! ```
//!
//! Request id and logging sit outside the boundary so their post-logic sees
//! the rendered error response.

use strata_config::{LogFormat, StrataConfig};
use strata_pipeline::stages::{DeadlineStage, ErrorBoundary, LoggingStage, RequestIdStage};
use strata_pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
use strata_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

use crate::error::StrataResult;

/// Maps the `[pipeline]` section onto engine options.
#[must_use]
pub fn pipeline_options(config: &StrataConfig) -> PipelineOptions {
    let section = &config.pipeline;
    let mut options = PipelineOptions::default().with_trace(section.record_trace);
    if let Some(max) = section.max_stages {
        options = options.with_max_stages(max);
    }
    if let Some(threshold) = section.slow_stage_threshold() {
        options = options.with_slow_stage_threshold(threshold);
    }
    options
}

/// Maps the `[telemetry]` section onto telemetry settings.
#[must_use]
pub fn telemetry_config(config: &StrataConfig) -> TelemetryConfig {
    let section = &config.telemetry;

    let logging = LogConfig {
        enabled: section.logging.enabled,
        level: section.logging.level.clone(),
        json_format: section.logging.format == LogFormat::Json,
        file_line_info: section.logging.include_location,
        ..LogConfig::default()
    };
    let metrics = MetricsConfig {
        enabled: section.metrics.enabled,
        addr: Some(section.metrics.addr.clone()),
        ..MetricsConfig::default()
    };

    TelemetryConfig::builder()
        .service_name(&section.service_name)
        .environment(&section.environment)
        .logging(logging)
        .metrics(metrics)
        .build()
}

/// Installs logging and metrics as configured.
///
/// # Errors
///
/// Returns `StrataError::Telemetry` if a subsystem cannot be installed,
/// for example because a global subscriber already exists.
pub fn init_telemetry(config: &StrataConfig) -> StrataResult<()> {
    strata_telemetry::init_telemetry(&telemetry_config(config))?;
    Ok(())
}

/// Starts a pipeline builder with the configured options and built-in stages.
///
/// # Example
///
/// ```
/// use strata::{pipeline_builder, StrataConfig};
/// use strata::pipeline::FnStage;
///
/// let mut config = StrataConfig::default();
/// config.pipeline.name = "orders".to_string();
/// config.pipeline.deadline_ms = Some(500);
///
/// let pipeline = pipeline_builder(&config)
///     .stage(FnStage::new("handler"))
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.name(), "orders");
/// assert_eq!(
///     pipeline.stage_names(),
///     vec!["request_id", "logging", "error_boundary", "deadline", "handler"]
/// );
/// ```
#[must_use]
pub fn pipeline_builder(config: &StrataConfig) -> PipelineBuilder {
    let section = &config.pipeline;

    let request_id = if section.trust_incoming_request_id {
        RequestIdStage::trust_incoming()
    } else {
        RequestIdStage::new()
    };

    let mut builder = Pipeline::builder(section.name.clone())
        .options(pipeline_options(config))
        .stage(request_id)
        .stage(LoggingStage::new())
        .stage(ErrorBoundary::new().expose_internal_errors(section.expose_internal_errors));

    if let Some(budget) = section.deadline() {
        builder = builder.stage(DeadlineStage::new(budget));
    }

    builder
}

/// Builds a pipeline that carries only the built-in stages.
///
/// # Errors
///
/// Returns `StrataError::Pipeline` if `max_stages` is too small for the
/// built-in stages.
pub fn base_pipeline(config: &StrataConfig) -> StrataResult<Pipeline> {
    Ok(pipeline_builder(config).build()?)
}
