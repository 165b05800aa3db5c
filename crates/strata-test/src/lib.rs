//! # Strata Test
//!
//! Test utilities for Strata pipelines.
//!
//! ## Key Features
//!
//! - **Journal**: Shared, ordered log of every hook a probe ran
//! - **Probes**: Configurable stages that pass, short-circuit, terminate,
//!   fail or trap on demand
//! - **Request Builder**: Fluent API for building requests and contexts
//! - **Response Helpers**: Collect and inspect response bodies
//!
//! ## Example
//!
//! ```
//! use strata_pipeline::Pipeline;
//! use strata_test::{Journal, Probe, TestRequest};
//!
//! # tokio_test::block_on(async {
//! let journal = Journal::new();
//! let pipeline = Pipeline::builder("onion")
//!     .stage(Probe::new("a", &journal))
//!     .stage(Probe::new("b", &journal).short_circuit())
//!     .stage(Probe::new("c", &journal))
//!     .build()
//!     .unwrap();
//!
//! let ctx = TestRequest::get("/").into_context().unwrap();
//! let execution = pipeline.execute(ctx).await;
//!
//! assert_eq!(execution.short_circuited_by(), Some("b"));
//! assert_eq!(journal.entries(), ["a.before", "b.before", "b.after", "a.after"]);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/strata-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod journal;
mod probe;
mod request;
mod response;

pub use error::TestError;
pub use journal::Journal;
pub use probe::{Probe, TrapMode};
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
