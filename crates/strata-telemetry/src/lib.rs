//! Logging and metrics setup for Strata pipelines.
//!
//! The pipeline engine only talks to the `tracing` and `metrics` facades.
//! This crate installs the backends a host wants behind them:
//!
//! - **Logging**: a `tracing-subscriber` registry with an `EnvFilter` and a
//!   JSON or pretty fmt layer
//! - **Metrics**: the Prometheus recorder from `metrics-exporter-prometheus`,
//!   with the pipeline metrics described
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_telemetry::{init_telemetry, LogConfig, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("orders")
//!     .environment("production")
//!     .logging(LogConfig::production())
//!     .metrics_addr("0.0.0.0:9090")
//!     .build();
//!
//! init_telemetry(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/strata-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::config::{TelemetryConfig, TelemetryConfigBuilder};
pub use crate::error::TelemetryError;
pub use crate::logging::{create_env_filter, init_logging, LogConfig};
pub use crate::metrics::{describe_pipeline_metrics, init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// Call once at startup, before the first pipeline executes.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        metrics = config.metrics.enabled,
        "telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry_is_noop() {
        let config = TelemetryConfig::builder()
            .logging(LogConfig {
                enabled: false,
                ..LogConfig::default()
            })
            .metrics(MetricsConfig {
                enabled: false,
                ..MetricsConfig::default()
            })
            .build();

        assert!(init_telemetry(&config).is_ok());
        assert!(render_metrics().is_none());
    }
}
