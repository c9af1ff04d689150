//! Admission guard middleware.
//!
//! Runs before any other request processing. A request whose path is not
//! covered by the allowlist is answered here with a fixed 403 and never
//! reaches the normalizer, the forwarder or the backend.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::trie::AllowlistTrie;

/// Body of every denial response.
pub const BLOCKED_JSON: &[u8] = br#"{"error":"request_blocked","reason":"path_not_allowed"}"#;

/// Owns the allowlist for the lifetime of the server.
#[derive(Debug)]
pub struct AdmissionGuard {
    trie: AllowlistTrie,
}

impl AdmissionGuard {
    pub fn new(trie: AllowlistTrie) -> Self {
        Self { trie }
    }

    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowlistTrie::from_prefixes(prefixes))
    }

    /// Number of prefixes that admit anything.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// True when every request would be denied.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Decision for a URI path component. The method plays no part.
    pub fn admits(&self, path: &str) -> bool {
        self.trie.is_allowed(path)
    }

    /// The fixed denial response.
    pub fn denial() -> Response {
        let mut response = Response::new(Body::from(BLOCKED_JSON));
        *response.status_mut() = StatusCode::FORBIDDEN;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

/// `axum::middleware::from_fn_with_state` entry point.
///
/// Only `uri().path()` is matched, so a query string such as
/// `/other?next=/api` can never satisfy a prefix.
pub async fn admission_guard(
    State(guard): State<Arc<AdmissionGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();

    if !guard.admits(path) {
        tracing::debug!(
            method = %request.method(),
            path = %path,
            "Blocked request, path not allowed"
        );
        return AdmissionGuard::denial();
    }

    next.run(request).await
}
