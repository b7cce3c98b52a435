use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Adopts the caller's `x-request-id` when it is a sane token, otherwise mints
/// one, and echoes it on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Runs the request inside a span carrying its id and reports every 4xx/5xx
/// with the attached [`ErrorReport`].
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
        query = uri.query().unwrap_or_default(),
    );
    let mut response = next.run(request).instrument(span.clone()).await;
    let _entered = span.enter();
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let report = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .unwrap_or_else(|| ErrorReport::from_message("unknown", status, status.to_string()));
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status_code = status.as_u16();

    if status.is_server_error() {
        error!(
            target: "catalog::http::response",
            status = status_code,
            elapsed_ms,
            origin = report.origin,
            detail = report.summary(),
            chain = ?report.chain,
            "Request failed"
        );
    } else {
        warn!(
            target: "catalog::http::response",
            status = status_code,
            elapsed_ms,
            origin = report.origin,
            detail = report.summary(),
            "Request rejected"
        );
    }

    response
}
