//! Configuration schema types.
//!
//! This module defines the structure of every configuration section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration section.
///
/// Controls registration limits, tracing of executions and the built-in
/// stages a host installs in front of its own.
///
/// # Example
///
/// ```
/// use strata_config::PipelineSection;
///
/// let section: PipelineSection = toml::from_str(r#"
///     name = "orders"
///     max_stages = 32
///     deadline_ms = 2500
/// "#).unwrap();
///
/// assert_eq!(section.name, "orders");
/// assert_eq!(section.max_stages, Some(32));
/// assert!(!section.record_trace);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Pipeline name used in logs and metric labels.
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Upper bound on registered stages, counting branch arms. None is unbounded.
    #[serde(default)]
    pub max_stages: Option<usize>,

    /// Record a step-by-step trace on every execution.
    #[serde(default)]
    pub record_trace: bool,

    /// Warn when a single hook runs longer than this many milliseconds.
    #[serde(default)]
    pub slow_stage_threshold_ms: Option<u64>,

    /// Reuse a well-formed incoming `x-request-id` instead of minting one.
    #[serde(default)]
    pub trust_incoming_request_id: bool,

    /// Terminate with `504` once an execution has run this long.
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// Show internal error messages to clients.
    #[serde(default)]
    pub expose_internal_errors: bool,
}

impl PipelineSection {
    /// Slow-stage threshold as a [`Duration`].
    #[must_use]
    pub fn slow_stage_threshold(&self) -> Option<Duration> {
        self.slow_stage_threshold_ms.map(Duration::from_millis)
    }

    /// Execution deadline as a [`Duration`].
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            max_stages: None,
            record_trace: false,
            slow_stage_threshold_ms: None,
            trust_incoming_request_id: false,
            deadline_ms: None,
            expose_internal_errors: false,
        }
    }
}

fn default_pipeline_name() -> String {
    "strata".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log filter directive (e.g. "info" or "strata_pipeline=debug,warn").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name attached to log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment (e.g. "development", "production").
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

fn default_service_name() -> String {
    "strata-service".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_section_default() {
        let section = PipelineSection::default();
        assert_eq!(section.name, "strata");
        assert_eq!(section.max_stages, None);
        assert!(!section.record_trace);
        assert!(section.slow_stage_threshold().is_none());
        assert!(section.deadline().is_none());
        assert!(!section.expose_internal_errors);
    }

    #[test]
    fn test_pipeline_section_durations() {
        let section = PipelineSection {
            slow_stage_threshold_ms: Some(50),
            deadline_ms: Some(1500),
            ..PipelineSection::default()
        };
        assert_eq!(section.slow_stage_threshold(), Some(Duration::from_millis(50)));
        assert_eq!(section.deadline(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_pipeline_section_unknown_field_rejected() {
        let toml = r#"
            name = "orders"
            max_stage = 10
        "#;
        let result: Result<PipelineSection, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_logging_section_default() {
        let section = LoggingSection::default();
        assert!(section.enabled);
        assert_eq!(section.level, "info");
        assert_eq!(section.format, LogFormat::Json);
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);

        let result: Result<LogFormat, _> = serde_json::from_str(r#""compact""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let section = MetricsSection::default();
        assert!(!section.enabled);
        assert_eq!(section.addr, "0.0.0.0:9090");
    }

    #[test]
    fn test_telemetry_section_partial() {
        let toml = r#"
            service_name = "checkout"

            [logging]
            format = "pretty"
        "#;
        let section: TelemetrySection = toml::from_str(toml).unwrap();
        assert_eq!(section.service_name, "checkout");
        assert_eq!(section.environment, "development");
        assert_eq!(section.logging.format, LogFormat::Pretty);
        assert!(section.logging.enabled);
    }
}
