//! Request identifiers for log correlation.

use axum::http::HeaderMap;

/// Inbound header read for log correlation. It is forwarded like any other
/// header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Placeholder logged when the client sent no usable id.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// The client's request id, safe to embed in a log line.
pub fn from_headers(headers: &HeaderMap) -> String {
    sanitize(
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}

/// Strip CR/LF so a crafted id cannot forge log lines; blank becomes
/// [`UNKNOWN_REQUEST_ID`].
pub fn sanitize(value: Option<&str>) -> String {
    let cleaned: String = value
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();

    if cleaned.trim().is_empty() {
        UNKNOWN_REQUEST_ID.to_string()
    } else {
        cleaned
    }
}
