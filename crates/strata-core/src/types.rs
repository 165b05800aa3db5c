//! Request and response types carried through a pipeline.
//!
//! The engine never parses HTTP. Hosts hand over already-built `http`
//! values and read the response back after execution.

use bytes::Bytes;
use http_body_util::Full;

/// The request type stored in a pipeline context.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The response type stored in a pipeline context.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building responses from stages.
pub trait ResponseExt {
    /// Creates a plain-text response with the given status code.
    fn text(status: http::StatusCode, body: &str) -> Response;

    /// Creates a JSON error envelope.
    ///
    /// ```json
    /// { "error": { "code": "...", "message": "...", "request_id": "..." } }
    /// ```
    ///
    /// `request_id` is omitted when `None`.
    fn json_error(
        status: http::StatusCode,
        code: &str,
        message: &str,
        request_id: Option<&str>,
    ) -> Response;
}

impl ResponseExt for Response {
    fn text(status: http::StatusCode, body: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(body.to_string())))
            .expect("failed to build text response")
    }

    fn json_error(
        status: http::StatusCode,
        code: &str,
        message: &str,
        request_id: Option<&str>,
    ) -> Response {
        let mut error = serde_json::json!({
            "code": code,
            "message": message,
        });
        if let Some(request_id) = request_id {
            error["request_id"] = serde_json::Value::from(request_id);
        }
        let body = serde_json::json!({ "error": error });

        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .expect("failed to build JSON error response")
    }
}
