use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

/// Logs every request with a correlation id, the matched route and the
/// outcome. The log level follows the status class.
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "incoming request"
    );

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    match status {
        500..=599 => tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            duration_ms,
            "request failed"
        ),
        400..=499 => tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            duration_ms,
            "request rejected"
        ),
        _ => tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            duration_ms,
            "request completed"
        ),
    }

    response
}
