//! Request logging for the `/api/v1` surface.
//!
//! Grounded on `api/middleware/admin_logging.rs`'s `admin_api_logging_middleware`,
//! stripped of the session/basic-auth user lookups — this system has no
//! authenticated callers — but keeping its structured start/complete JSON
//! log pair.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;

pub async fn api_request_logging(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        target: "api",
        "{}",
        json!({
            "event": "api_request_started",
            "method": method.to_string(),
            "path": path,
        })
    );

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    let log = json!({
        "event": "api_request_completed",
        "method": method.to_string(),
        "path": path,
        "status": status.as_u16(),
        "duration_ms": duration_ms,
    });

    if status.is_server_error() {
        tracing::warn!(target: "api", "{}", log);
    } else {
        tracing::info!(target: "api", "{}", log);
    }

    response
}
