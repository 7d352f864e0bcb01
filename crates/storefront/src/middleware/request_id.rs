//! Request ID middleware for request tracing and correlation.
//!
//! Every request carries an id: the upstream `x-request-id` when a proxy set
//! one, a fresh UUID v4 otherwise. The id is recorded on the tracing span,
//! tagged in Sentry, stored in request extensions as [`RequestId`] and echoed
//! on the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted; longer values are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The current request's id, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Pick the request id: a sane upstream value or a new UUID.
fn resolve(upstream: Option<&HeaderValue>) -> String {
    upstream
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = resolve(request.headers().get(REQUEST_ID_HEADER));

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_kept() {
        let upstream = HeaderValue::from_static("cf-7a1b");
        assert_eq!(resolve(Some(&upstream)), "cf-7a1b");
    }

    #[test]
    fn test_missing_or_oversized_id_is_generated() {
        let generated = resolve(None);
        assert!(Uuid::parse_str(&generated).is_ok());

        let long = HeaderValue::from_str(&"x".repeat(MAX_REQUEST_ID_LEN + 1)).unwrap();
        assert!(Uuid::parse_str(&resolve(Some(&long))).is_ok());

        let blank = HeaderValue::from_static("  ");
        assert!(Uuid::parse_str(&resolve(Some(&blank))).is_ok());
    }
}
