//! # Strata Core
//!
//! Core value types shared by the Strata pipeline crates.
//!
//! This crate provides the foundational types used throughout Strata:
//!
//! - [`RequestId`] - UUID v7 identifier assigned to every execution
//! - [`Request`] / [`Response`] - `http` types carried by a pipeline context
//! - [`ResponseExt`] - Builders for plain-text and JSON error responses
//! - [`Extensions`] - Type-keyed map for arbitrary per-execution data
//! - [`Rejection`] - Typed stage failure that maps onto an HTTP status
//! - [`names`] - Metric names shared by the engine and telemetry

#![doc(html_root_url = "https://docs.rs/strata-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod extensions;
pub mod names;
mod rejection;
mod request_id;
mod types;

pub use extensions::Extensions;
pub use rejection::{Rejection, RejectionKind};
pub use request_id::RequestId;
pub use types::{Request, Response, ResponseExt};
