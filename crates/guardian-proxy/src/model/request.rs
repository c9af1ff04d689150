//! Normalized inbound request.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use super::headers::{Headers, RawHeaders};

/// Construction failures for [`InternalRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request body exceeds max allowed size: {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("HTTP method is mandatory")]
    MissingMethod,

    #[error("URI/path is mandatory")]
    MissingPath,
}

/// A bounded, normalized copy of the client request.
///
/// Invariants held from construction onward:
/// - `method` and `path` are non-blank and `path` starts with `/`
/// - header names are lowercase and unique
/// - `body.len()` never exceeds the limit it was built with
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InternalRequest {
    method: String,
    path: String,
    headers: Headers,
    body: Bytes,
}

impl InternalRequest {
    /// Validate and normalize a request extracted from the wire.
    ///
    /// `path` may include a query string; it is kept verbatim apart from
    /// gaining a leading `/` when missing.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        raw_headers: RawHeaders,
        body: impl Into<Bytes>,
        max_body_size: usize,
    ) -> Result<Self, RequestError> {
        let body = body.into();
        if body.len() > max_body_size {
            return Err(RequestError::PayloadTooLarge {
                limit: max_body_size,
            });
        }

        let method = method.into();
        if method.trim().is_empty() {
            return Err(RequestError::MissingMethod);
        }

        let mut path = path.into();
        if path.trim().is_empty() {
            return Err(RequestError::MissingPath);
        }
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Ok(Self {
            method,
            path,
            headers: Headers::normalize(raw_headers),
            body,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path plus query string, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

impl fmt::Debug for InternalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}
