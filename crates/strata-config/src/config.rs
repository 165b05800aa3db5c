//! Top-level configuration.
//!
//! This module provides the root [`StrataConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, PipelineSection, TelemetrySection};

/// Complete Strata configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use strata_config::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.pipeline.name, "strata");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl StrataConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> StrataConfigBuilder {
        StrataConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The pipeline name is empty
    /// - `max_stages`, `deadline_ms` or `slow_stage_threshold_ms` is zero
    /// - The log level is empty
    /// - Metrics are enabled and the address is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;

        if pipeline.name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "pipeline.name",
                "must not be empty",
            ));
        }

        if pipeline.max_stages == Some(0) {
            return Err(ConfigError::invalid_value(
                "pipeline.max_stages",
                "must be greater than zero",
            ));
        }

        if pipeline.deadline_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "pipeline.deadline_ms",
                "must be greater than zero",
            ));
        }

        if pipeline.slow_stage_threshold_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "pipeline.slow_stage_threshold_ms",
                "must be greater than zero",
            ));
        }

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Development preset.
    ///
    /// - Pretty log formatting at debug level with source locations
    /// - Execution traces recorded
    /// - Internal error messages exposed
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::StrataConfig;
    ///
    /// let config = StrataConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// assert!(config.pipeline.record_trace);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();

        config.pipeline.record_trace = true;
        config.pipeline.expose_internal_errors = true;

        config
    }

    /// Production preset.
    ///
    /// - JSON log formatting at info level
    /// - Prometheus exporter enabled
    /// - Slow hooks reported after 250ms
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::{LogFormat, StrataConfig};
    ///
    /// let config = StrataConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// assert!(!config.pipeline.expose_internal_errors);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.environment = "production".to_string();
        config.telemetry.metrics.enabled = true;

        config.pipeline.record_trace = false;
        config.pipeline.expose_internal_errors = false;
        config.pipeline.slow_stage_threshold_ms = Some(250);

        config
    }
}

/// Builder for [`StrataConfig`].
#[derive(Debug, Default)]
pub struct StrataConfigBuilder {
    pipeline: Option<PipelineSection>,
    telemetry: Option<TelemetrySection>,
}

impl StrataConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pipeline section.
    #[must_use]
    pub fn pipeline(mut self, pipeline: PipelineSection) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> StrataConfig {
        StrataConfig {
            pipeline: self.pipeline.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }
}
