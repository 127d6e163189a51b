//! Request timing middleware for the roster API.
//!
//! Sits as the outermost layer in `routes::build_routes` so that
//! responses produced by the framework itself - 404 for unknown paths,
//! 405 for wrong methods, 415 for bad content types - are counted
//! alongside handler responses. The raw request path is handed to
//! [`record_http_request`], which collapses meeting and record IDs into
//! `{id}` placeholders and folds unrecognized paths into `/other`,
//! keeping the `endpoint` label cardinality bounded no matter what
//! clients send.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Time the request and record method, endpoint, and status once the
/// response is ready.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();

    // Capture before the request is consumed by the rest of the stack.
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );

    response
}
