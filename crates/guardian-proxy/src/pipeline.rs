//! Per-request orchestration: normalize, forward, emit.
//!
//! Runs only for requests the admission guard let through. Each stage runs
//! exactly once and in order; stage failures become fixed client responses
//! here, so nothing below this point writes to the client.

use std::error::Error as StdError;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

use crate::mapper::{Emitter, IngressError, RequestMapper, ResponseMapper};
use crate::proxy::Forwarder;

/// Body of every 413 response.
pub const PAYLOAD_TOO_LARGE_JSON: &[u8] = br#"{"error":"payload_too_large"}"#;

/// Normalizer → Forwarder → Emitter.
pub struct Pipeline<F, E = ResponseMapper> {
    normalizer: RequestMapper,
    forwarder: F,
    emitter: E,
}

impl<F: Forwarder> Pipeline<F, ResponseMapper> {
    pub fn new(normalizer: RequestMapper, forwarder: F) -> Self {
        Self::with_emitter(normalizer, forwarder, ResponseMapper)
    }
}

impl<F: Forwarder, E: Emitter> Pipeline<F, E> {
    pub fn with_emitter(normalizer: RequestMapper, forwarder: F, emitter: E) -> Self {
        Self {
            normalizer,
            forwarder,
            emitter,
        }
    }

    /// Run one admitted request through the stages.
    ///
    /// Only a body read failure escapes as `Err`; the client connection is
    /// usually gone by then and the transport decides what, if anything, to
    /// send.
    pub async fn handle(&self, request: Request) -> Result<Response, IngressError> {
        let internal = match self.normalizer.map(request).await {
            Ok(internal) => internal,
            Err(IngressError::PayloadTooLarge { limit }) => {
                tracing::warn!(limit, "Rejected request, payload too large");
                return Ok(json_response(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE_JSON));
            }
            Err(IngressError::Malformed(e)) => {
                tracing::error!(error = %e, "Malformed request reached internal construction");
                return Ok(empty(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Err(e @ IngressError::Io(_)) => return Err(e),
        };

        match self.forwarder.forward(internal).await {
            Ok(response) => Ok(self.emitter.to_response(response)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    cause = %source_chain(&e),
                    "Failed to forward request to backend"
                );
                Ok(empty(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }
}

/// Fixed JSON error reply.
pub(crate) fn json_response(status: StatusCode, body: &'static [u8]) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// `a: b: c` rendering of an error's sources.
fn source_chain(err: &dyn StdError) -> String {
    let mut parts = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        parts.push(cause.to_string());
        current = cause.source();
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(": ")
    }
}
