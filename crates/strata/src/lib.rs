//! # Strata
//!
//! **Ordered stage pipelines with branches and error boundaries**
//!
//! - **Onion ordering**: pre-logic runs in registration order, post-logic
//!   in reverse
//! - **Short-circuit and terminate**: stop the inbound walk and unwind
//! - **Branches**: pick a sub-chain per execution, rejoining or terminal
//! - **Traps**: error boundaries that recover or re-raise
//! - **Observability**: `tracing` events and `metrics` counters throughout
//!
//! ## Quick Start
//!
//! ```
//! use strata::prelude::*;
//! use strata::pipeline::testing::empty_request;
//!
//! # tokio_test::block_on(async {
//! let config = StrataConfig::default();
//! let pipeline = strata::pipeline_builder(&config)
//!     .stage(FnStage::new("hello").before(|ctx| {
//!         ctx.set_response(Response::text(StatusCode::OK, "hello"));
//!         Ok(Flow::Stop)
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let execution = pipeline.execute(Context::new(empty_request("/"))).await;
//! assert!(execution.outcome().is_completed());
//! assert_eq!(execution.short_circuited_by(), Some("hello"));
//! # });
//! ```
//!
//! ## Bootstrapping a host
//!
//! ```rust,ignore
//! use strata::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("strata.toml")?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! strata::init_telemetry(&config)?;
//! let pipeline = strata::pipeline_builder(&config)
//!     .stage(AuthStage::new())
//!     .stage(Handler::new())
//!     .build()?;
//! ```

#![doc(html_root_url = "https://docs.rs/strata/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod error;

// Re-export member crates
pub use strata_config as config;
pub use strata_core as core;
pub use strata_pipeline as pipeline;
pub use strata_telemetry as telemetry;

pub use bootstrap::{base_pipeline, init_telemetry, pipeline_builder, pipeline_options, telemetry_config};
pub use error::{StrataError, StrataResult};
pub use strata_config::{ConfigLoader, StrataConfig, DEFAULT_ENV_PREFIX};

/// Prelude module for convenient imports.
///
/// ```
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use strata_config::{ConfigLoader, StrataConfig};

    pub use strata_core::{Rejection, RejectionKind, Request, RequestId, Response, ResponseExt};

    pub use strata_pipeline::{
        BranchMode, Chain, ConfigurationError, Context, Execution, Flow, FnStage, Outcome,
        Phase, Pipeline, PipelineBuilder, PipelineOptions, Stage, StageError,
    };

    pub use strata_pipeline::stages::{
        DeadlineStage, ErrorBoundary, LoggingStage, NormalizedError, RequestIdStage,
    };

    pub use http::StatusCode;
}
