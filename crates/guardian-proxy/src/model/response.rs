//! Backend reply as seen by the egress stage.

use std::fmt;

use bytes::Bytes;

use super::headers::Headers;

/// Status, headers and fully buffered body of a backend response.
///
/// Equality and hashing compare the body by content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InternalResponse {
    status_code: u16,
    headers: Headers,
    body: Bytes,
}

impl InternalResponse {
    pub fn new(status_code: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (u16, Headers, Bytes) {
        (self.status_code, self.headers, self.body)
    }
}

impl fmt::Debug for InternalResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalResponse")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}
