//! Ingress boundary: axum request to [`InternalRequest`].
//!
//! The body is read chunk by chunk and the read stops as soon as the running
//! total passes the configured limit, so an oversized upload is never fully
//! buffered.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap};
use bytes::BytesMut;
use futures_util::StreamExt;
use thiserror::Error;

use crate::model::{InternalRequest, RawHeaders, RequestError};

/// Failures while turning a wire request into an [`InternalRequest`].
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("request body exceeds max allowed size: {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request: {0}")]
    Malformed(RequestError),

    #[error("failed to read request body")]
    Io(#[source] axum::Error),
}

impl From<RequestError> for IngressError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::PayloadTooLarge { limit } => IngressError::PayloadTooLarge { limit },
            other => IngressError::Malformed(other),
        }
    }
}

/// Builds bounded internal requests.
#[derive(Debug, Clone)]
pub struct RequestMapper {
    max_body_size: usize,
}

impl RequestMapper {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }

    /// Consume the request and produce its internal form.
    pub async fn map(&self, request: Request) -> Result<InternalRequest, IngressError> {
        let (parts, body) = request.into_parts();

        let method = parts.method.as_str().to_string();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        if let Some(declared) = declared_length(&parts.headers) {
            if declared > self.max_body_size as u64 {
                return Err(IngressError::PayloadTooLarge {
                    limit: self.max_body_size,
                });
            }
        }

        let headers = extract_headers(&parts.headers);
        let body = self.read_body(body).await?;

        Ok(InternalRequest::new(
            method,
            path,
            headers,
            body,
            self.max_body_size,
        )?)
    }

    async fn read_body(&self, body: Body) -> Result<BytesMut, IngressError> {
        let mut stream = body.into_data_stream();
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(IngressError::Io)?;
            if buffer.len() + chunk.len() > self.max_body_size {
                return Err(IngressError::PayloadTooLarge {
                    limit: self.max_body_size,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }
}

/// Copy headers as presented, one entry per name with every value.
fn extract_headers(map: &HeaderMap) -> RawHeaders {
    let mut raw = RawHeaders::new();
    for name in map.keys() {
        raw.insert(
            name.as_str().to_string(),
            map.get_all(name).iter().cloned().collect(),
        );
    }
    raw
}

fn declared_length(map: &HeaderMap) -> Option<u64> {
    map.get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
