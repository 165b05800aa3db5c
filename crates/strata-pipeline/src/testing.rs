//! Request fixtures for tests and doc examples.

use bytes::Bytes;
use http::Method;
use http_body_util::Full;
use strata_core::Request;

/// Builds a `GET` request for `path` with an empty body.
#[must_use]
pub fn empty_request(path: &str) -> Request {
    request(Method::GET, path)
}

/// Builds a request with the given method and path and an empty body.
#[must_use]
pub fn request(method: Method, path: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(path)
        .body(Full::new(Bytes::new()))
        .expect("failed to build test request")
}
