//! Built-in stages.
//!
//! A typical service pipeline registers them outermost first:
//!
//! 1. [`RequestIdStage`] - Assign or propagate the request ID
//! 2. [`LoggingStage`] - Structured request logs
//! 3. [`ErrorBoundary`] - Trap converting faults into error envelopes
//! 4. [`DeadlineStage`] - Terminate executions whose budget is spent
//!
//! Request ID and logging sit outside the boundary so their post-logic sees
//! the rendered error response.

pub mod deadline;
pub mod error_boundary;
pub mod logging;
pub mod request_id;

pub use deadline::DeadlineStage;
pub use error_boundary::{ErrorBoundary, NormalizedError};
pub use logging::LoggingStage;
pub use request_id::{RequestIdStage, REQUEST_ID_HEADER};
