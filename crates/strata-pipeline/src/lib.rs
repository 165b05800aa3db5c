//! # Strata Pipeline
//!
//! Ordered, composable stage pipeline with branching and error boundaries.
//!
//! A [`Pipeline`] runs every request through an ordered list of [`Stage`]s.
//! Each stage has pre-logic ([`Stage::before`]) and post-logic
//! ([`Stage::after`]); stages registered first wrap stages registered later.
//!
//! ```text
//! Request → A.before → B.before → C.before
//!                                    ↓
//! Response ← A.after ← B.after ← C.after
//! ```
//!
//! ## Key Features
//!
//! - **Short-circuit**: `before` returns [`Flow::Stop`] and no later stage
//!   is entered; every entered stage still runs its post-logic
//! - **Terminate**: [`Context::terminate`] writes a final response and halts
//!   the chain the same way
//! - **Branches**: a predicate picks one of two sub-[`Chain`]s per execution
//! - **Traps**: stages with [`Stage::is_trap`] catch failures of the stages
//!   they wrap and may recover or re-raise
//! - **Sealing**: registration is rejected once the pipeline has run
//! - **Concurrency**: `execute(&self)` runs safely from many tasks at once
//!
//! ## Example
//!
//! ```
//! use strata_pipeline::{Context, FnStage, Flow, Pipeline};
//! use strata_pipeline::stages::ErrorBoundary;
//! use strata_pipeline::testing::empty_request;
//! use strata_core::Rejection;
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder("api")
//!     .stage(ErrorBoundary::new())
//!     .stage(FnStage::new("auth").before(|ctx| {
//!         if ctx.request().headers().contains_key("authorization") {
//!             Ok(Flow::Continue)
//!         } else {
//!             Err(Rejection::unauthorized("missing credentials").into())
//!         }
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let execution = pipeline.execute(Context::new(empty_request("/orders"))).await;
//! assert!(execution.outcome().is_completed());
//! assert_eq!(execution.context().response().unwrap().status().as_u16(), 401);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/strata-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod context;
pub mod error;
pub mod execution;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod testing;

// Re-export main types at crate root
pub use chain::{BranchMode, Chain, Predicate};
pub use context::Context;
pub use error::{ConfigurationError, Phase, StageError};
pub use execution::{Direction, Execution, Outcome, Step, TraceEvent};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
pub use stage::{BoxFuture, FnStage, Flow, Stage};
pub use strata_core::{Request, RequestId, Response, ResponseExt};
