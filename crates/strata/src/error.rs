//! Bootstrap error type.

use thiserror::Error;

/// Errors raised while bootstrapping a host from configuration.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] strata_config::ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] strata_telemetry::TelemetryError),

    /// A stage registration was rejected.
    #[error(transparent)]
    Pipeline(#[from] strata_pipeline::ConfigurationError),
}

/// Result alias for bootstrap operations.
pub type StrataResult<T> = Result<T, StrataError>;
