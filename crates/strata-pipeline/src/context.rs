//! Per-execution context.
//!
//! The [`Context`] carries state through the pipeline. The host builds one
//! from each incoming request, every stage reads and mutates it, and the
//! host reads the response back once [`Pipeline::execute`] returns.
//!
//! [`Pipeline::execute`]: crate::Pipeline::execute

use std::time::{Duration, Instant};
use strata_core::{Extensions, Request, RequestId, Response};

/// Context that flows through the pipeline.
///
/// # Example
///
/// ```
/// use strata_pipeline::Context;
/// use strata_pipeline::testing::empty_request;
///
/// #[derive(Debug, PartialEq)]
/// struct Authorized(bool);
///
/// let mut ctx = Context::new(empty_request("/orders"));
/// ctx.set_extension(Authorized(false));
///
/// assert_eq!(ctx.path(), "/orders");
/// assert_eq!(ctx.get_extension::<Authorized>(), Some(&Authorized(false)));
/// assert!(!ctx.is_terminated());
/// ```
#[derive(Debug)]
pub struct Context {
    /// Unique identifier for this execution.
    request_id: RequestId,

    /// The request handed over by the host.
    request: Request,

    /// The response written by a stage, if any.
    response: Option<Response>,

    /// Name of the stage whose hook is currently running.
    current_stage: Option<String>,

    /// Name of the stage that called [`Context::terminate`].
    terminated_by: Option<String>,

    /// Whether the termination flag is set.
    terminated: bool,

    /// When the context was created.
    started_at: Instant,

    /// Type-erased extension data.
    extensions: Extensions,
}

impl Context {
    /// Creates a context for the given request with a fresh request ID.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self::with_request_id(request, RequestId::new())
    }

    /// Creates a context with a specific request ID.
    ///
    /// Useful when the host already assigned an identifier upstream.
    #[must_use]
    pub fn with_request_id(request: Request, request_id: RequestId) -> Self {
        Self {
            request_id,
            request,
            response: None,
            current_stage: None,
            terminated_by: None,
            terminated: false,
            started_at: Instant::now(),
            extensions: Extensions::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request mutably.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Shorthand for the request URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Shorthand for the request method.
    #[must_use]
    pub fn method(&self) -> &http::Method {
        self.request.method()
    }

    /// Returns the response, if one was written.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns the response mutably, if one was written.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Writes the response without touching the termination flag.
    ///
    /// Downstream stages still run. Use [`Context::terminate`] to stop.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Removes and returns the response.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Writes a final response and halts the chain.
    ///
    /// No stage after the current one is entered. Post-logic still runs for
    /// the current stage and every stage entered before it.
    pub fn terminate(&mut self, response: Response) {
        self.response = Some(response);
        self.terminated = true;
        self.terminated_by = self.current_stage.clone();
    }

    /// Whether [`Context::terminate`] has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Name of the stage that terminated the execution, if any.
    #[must_use]
    pub fn terminated_by(&self) -> Option<&str> {
        self.terminated_by.as_deref()
    }

    /// Name of the stage whose hook is currently running.
    #[must_use]
    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    pub(crate) fn enter_stage(&mut self, name: &str) {
        self.current_stage = Some(name.to_string());
    }

    pub(crate) fn leave_stage(&mut self) {
        self.current_stage = None;
    }

    /// Returns when the context was created.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous one.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove()
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains::<T>()
    }

    /// Returns the full extension map.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the full extension map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Splits the context into its request and response.
    #[must_use]
    pub fn into_parts(self) -> (Request, Option<Response>) {
        (self.request, self.response)
    }
}
