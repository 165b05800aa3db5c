//! Typed configuration for Strata pipelines.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (unknown fields are rejected)
//! - Layered configuration (defaults or preset → files → env)
//!
//! # Example
//!
//! ```no_run
//! use strata_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! # fn main() -> Result<(), strata_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_file("strata.toml")?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! println!("max stages: {:?}", config.pipeline.max_stages);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [pipeline]
//! name = "orders"
//! max_stages = 64
//! record_trace = false
//! slow_stage_threshold_ms = 250
//! trust_incoming_request_id = true
//! deadline_ms = 5000
//! expose_internal_errors = false
//!
//! [telemetry]
//! service_name = "orders-api"
//! environment = "production"
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! include_location = false
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every key can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `STRATA__PIPELINE__MAX_STAGES=128`
//! - `STRATA__PIPELINE__DEADLINE_MS=none`
//! - `STRATA__TELEMETRY__LOGGING__LEVEL=strata_pipeline=debug,info`

#![doc(html_root_url = "https://docs.rs/strata-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{StrataConfig, StrataConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{LogFormat, LoggingSection, MetricsSection, PipelineSection, TelemetrySection};
