//! Egress boundary: [`InternalResponse`] to the axum response sent to the
//! client.
//!
//! No header filtering happens here. Backend headers, hop-by-hop ones
//! included, are relayed as received.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::StatusCode;
use axum::response::Response;

use crate::model::InternalResponse;

/// Final pipeline stage.
pub trait Emitter: Send + Sync + 'static {
    fn to_response(&self, response: InternalResponse) -> Response;
}

/// Relays status, headers and body without transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMapper;

impl Emitter for ResponseMapper {
    fn to_response(&self, response: InternalResponse) -> Response {
        let (status_code, headers, body) = response.into_parts();

        let status = StatusCode::from_u16(status_code).unwrap_or_else(|_| {
            tracing::warn!(status_code, "Backend returned unrepresentable status");
            StatusCode::BAD_GATEWAY
        });

        let mut out = Response::new(Body::from(body));
        *out.status_mut() = status;

        let wire = out.headers_mut();
        for (name, values) in headers.iter() {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::warn!(header = %name, "Dropping backend header with invalid name");
                continue;
            };
            for value in values {
                wire.append(name.clone(), value.clone());
            }
        }

        out
    }
}
