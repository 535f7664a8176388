use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Span;
use tower_http::trace::MakeSpan;

/// Request id carried through extensions and echoed back as `x-request-id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request ID injection middleware. Runs outside the trace layer so the
/// request span can carry the id.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// One span per request, tagged with the route template rather than the raw
/// URI so storage keys never end up in logs.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    backend: Arc<str>,
}

impl RequestSpan {
    pub fn new(backend: &str) -> Self {
        Self {
            backend: Arc::from(backend),
        }
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            route = route_label(request),
            backend = %self.backend,
            request_id = request_id_of(request),
        )
    }
}

fn route_label<B>(request: &axum::http::Request<B>) -> &str {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched")
}

fn request_id_of<B>(request: &axum::http::Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("")
}
