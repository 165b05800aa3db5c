//! Prometheus metrics for Strata pipelines.
//!
//! The engine records through the `metrics` facade; this module installs
//! the Prometheus recorder and describes the pipeline metrics.
//!
//! # Pipeline Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `strata_pipeline_executions_total` | Counter | `pipeline`, `outcome` |
//! | `strata_pipeline_execution_duration_seconds` | Histogram | `pipeline` |
//! | `strata_pipeline_stage_failures_total` | Counter | `pipeline`, `stage`, `phase` |
//! | `strata_pipeline_recoveries_total` | Counter | `pipeline`, `stage` |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use strata_core::names;

/// Global handle for rendering, set when no HTTP listener is used.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are installed at all.
    pub enabled: bool,

    /// Scrape endpoint address. When `None` the host renders metrics itself
    /// through [`render_metrics`].
    pub addr: Option<String>,

    /// Histogram buckets for execution duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
            duration_buckets: vec![
                0.000_5, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// With an address, an HTTP scrape listener is spawned and
/// [`render_metrics`] stays `None`. Without one, the handle is kept for
/// [`render_metrics`].
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for a malformed address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::EXECUTION_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            builder
                .with_http_listener(addr)
                .install()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        None => {
            let handle = builder
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    describe_pipeline_metrics();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` unless [`init_metrics`] installed a recorder without a
/// listener address.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for the pipeline metrics.
pub fn describe_pipeline_metrics() {
    describe_counter!(
        names::EXECUTIONS_TOTAL,
        "Pipeline executions by final outcome"
    );
    describe_histogram!(
        names::EXECUTION_DURATION_SECONDS,
        Unit::Seconds,
        "Wall time of a full pipeline execution"
    );
    describe_counter!(
        names::STAGE_FAILURES_TOTAL,
        "Stage hook failures by stage and phase"
    );
    describe_counter!(
        names::RECOVERIES_TOTAL,
        "Faults absorbed by trap stages"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.addr.is_none());
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disabled_metrics() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            addr: Some("nowhere".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_describe_without_recorder() {
        // The `metrics` facade is a no-op until a recorder is installed.
        describe_pipeline_metrics();
    }
}
