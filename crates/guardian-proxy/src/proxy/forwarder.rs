//! Single-backend forwarding.
//!
//! One shot, one origin: the internal request is replayed against the
//! configured backend and the reply is buffered into an [`InternalResponse`].
//! There is no retry and no backend selection. Response headers are relayed
//! unfiltered.

use std::future::Future;
use std::time::Instant;

use bytes::Bytes;
use reqwest::Method;
use thiserror::Error;
use tokio::task::{AbortHandle, JoinError};
use tracing::Instrument;

use crate::model::{Headers, InternalRequest, InternalResponse};

/// Request headers never copied to the backend, compared case-insensitively.
/// The HTTP client owns these.
pub const RESTRICTED_HEADERS: &[&str] = &["connection", "content-length", "expect", "host", "upgrade"];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a backend exchange produced no response.
///
/// Each variant has its own message prefix; the cause is kept for logs and
/// never sent to the client.
#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("Upstream backend failure: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("Request interrupted during forwarding")]
    Interrupted(#[source] JoinError),

    #[error("Failed to build valid backend request for {target}")]
    InvalidTarget {
        target: String,
        #[source]
        source: BoxError,
    },
}

impl From<JoinError> for ForwardingError {
    fn from(err: JoinError) -> Self {
        ForwardingError::Interrupted(err)
    }
}

/// Delivers an internal request to the backend.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        request: InternalRequest,
    ) -> impl Future<Output = Result<InternalResponse, ForwardingError>> + Send;
}

/// reqwest-backed forwarder bound to one backend origin.
///
/// Connect and overall timeouts are properties of the `reqwest::Client`
/// handed in at construction.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client, backend_url: &str) -> Self {
        Self {
            client,
            base_url: backend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Backend origin followed by the request path, query included.
    pub fn target_for(&self, request: &InternalRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }

    /// Build the outbound request without sending it.
    pub fn build_request(&self, request: &InternalRequest) -> Result<reqwest::Request, ForwardingError> {
        let target = self.target_for(request);

        // `Url` would silently percent-encode stray whitespace; `http::Uri`
        // rejects it, which is what a malformed path deserves.
        let checked = match http::Uri::try_from(target.as_str()) {
            Ok(uri) => uri,
            Err(e) => return Err(invalid_target(target, e)),
        };

        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| invalid_target(target.clone(), e))?;

        let mut builder = self.client.request(method, target.as_str());

        for (name, values) in request.headers().iter() {
            if is_restricted(name) {
                continue;
            }
            for value in values {
                builder = builder.header(name, value.clone());
            }
        }

        if request.has_body() {
            builder = builder.body(request.body().clone());
        }

        let outbound = builder.build().map_err(|e| {
            if e.is_builder() {
                invalid_target(target.clone(), e)
            } else {
                ForwardingError::Upstream(e)
            }
        })?;

        // `Url` resolves dot segments and rewrites `\` as `/`. The backend
        // must receive exactly the path that was admitted.
        if outbound.url().path() != checked.path() {
            let rewritten = format!("path would be rewritten to {}", outbound.url().path());
            return Err(invalid_target(target, rewritten));
        }

        Ok(outbound)
    }
}

impl Forwarder for HttpForwarder {
    async fn forward(&self, request: InternalRequest) -> Result<InternalResponse, ForwardingError> {
        let outbound = self.build_request(&request)?;
        let span = guardian_tracing::backend_forward_span!(outbound.method(), outbound.url());
        let client = self.client.clone();

        async move {
            let start = Instant::now();
            tracing::debug!("Forwarding request to backend");

            // The exchange runs in its own task so a panic or runtime
            // shutdown surfaces as `Interrupted` rather than unwinding the
            // connection task. Dropping this future aborts the exchange.
            let task = tokio::spawn(exchange(client, outbound).in_current_span());
            let _abort = AbortOnDrop(task.abort_handle());

            let result = match task.await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(ForwardingError::Upstream(e)),
                Err(e) => Err(ForwardingError::from(e)),
            };

            let latency = start.elapsed().as_millis() as u64;
            tracing::Span::current().record("latency_ms", latency);

            match &result {
                Ok(response) => {
                    tracing::Span::current().record("status", response.status_code());
                    tracing::info!(
                        status = response.status_code(),
                        latency_ms = latency,
                        headers = response.headers().len(),
                        body_len = response.body().len(),
                        "Forward complete"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, latency_ms = latency, "Forward failed");
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}

/// Send the request and buffer the whole reply.
async fn exchange(
    client: reqwest::Client,
    outbound: reqwest::Request,
) -> Result<InternalResponse, reqwest::Error> {
    let response = client.execute(outbound).await?;
    let status = response.status().as_u16();
    let headers = Headers::from_header_map(response.headers());
    let body: Bytes = response.bytes().await?;
    Ok(InternalResponse::new(status, headers, body))
}

fn is_restricted(name: &str) -> bool {
    RESTRICTED_HEADERS
        .iter()
        .any(|restricted| restricted.eq_ignore_ascii_case(name))
}

fn invalid_target(target: String, source: impl Into<BoxError>) -> ForwardingError {
    ForwardingError::InvalidTarget {
        target,
        source: source.into(),
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::future::IntoFuture;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::Request;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::Router;
    use tokio::sync::Mutex;

    use super::*;
    use crate::model::RawHeaders;

    const MAX: usize = 1024 * 1024;

    /// What the mock backend saw.
    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        uri: String,
        headers: HeaderMap,
        body: Bytes,
    }

    async fn spawn_backend(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, app).into_future());
        addr
    }

    /// Backend that records every request and answers 200 "ok".
    async fn recording_backend() -> (SocketAddr, Arc<Mutex<Vec<Seen>>>) {
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let app = Router::new().fallback(move |request: Request| {
            let seen = seen_clone.clone();
            async move {
                let (parts, body) = request.into_parts();
                let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                seen.lock().await.push(Seen {
                    method: parts.method.to_string(),
                    uri: parts.uri.to_string(),
                    headers: parts.headers,
                    body,
                });
                "ok"
            }
        });

        (spawn_backend(app).await, seen)
    }

    fn internal(method: &str, path: &str, headers: &[(&str, &[&'static str])], body: &[u8]) -> InternalRequest {
        let mut raw = RawHeaders::new();
        for (name, values) in headers {
            raw.insert(
                name.to_string(),
                values.iter().map(|v| HeaderValue::from_static(v)).collect(),
            );
        }
        InternalRequest::new(method, path, raw, body.to_vec(), MAX).unwrap()
    }

    fn forwarder(base: &str) -> HttpForwarder {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpForwarder::new(client, base)
    }

    #[test]
    fn test_target_concatenation() {
        let cases = [
            ("http://backend.example.com", "/users", "http://backend.example.com/users"),
            ("http://backend.example.com/", "/users", "http://backend.example.com/users"),
            ("http://backend.example.com/api", "/users", "http://backend.example.com/api/users"),
            ("http://backend.example.com/api/", "/v1/items?x=1", "http://backend.example.com/api/v1/items?x=1"),
            ("http://localhost:8080", "/", "http://localhost:8080/"),
        ];

        for (base, path, expected) in cases {
            let fwd = forwarder(base);
            let req = internal("GET", path, &[], b"");
            assert_eq!(fwd.target_for(&req), expected);
            let built = fwd.build_request(&req).unwrap();
            assert_eq!(built.url().as_str(), expected);
        }
    }

    #[test]
    fn test_all_methods_carried() {
        let fwd = forwarder("http://backend.example.com");
        for method in ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"] {
            let built = fwd.build_request(&internal(method, "/x", &[], b"")).unwrap();
            assert_eq!(built.method().as_str(), method);
        }
    }

    #[test]
    fn test_restricted_headers_filtered() {
        let fwd = forwarder("http://backend.example.com");
        let req = internal(
            "POST",
            "/x",
            &[
                ("Connection", &["keep-alive"]),
                ("Content-Length", &["4"]),
                ("Expect", &["100-continue"]),
                ("Host", &["evil.example.com"]),
                ("Upgrade", &["websocket"]),
                ("Authorization", &["Bearer token"]),
            ],
            b"data",
        );

        let built = fwd.build_request(&req).unwrap();
        let headers = built.headers();
        for name in RESTRICTED_HEADERS {
            assert!(!headers.contains_key(*name), "{name} must not be forwarded");
        }
        assert_eq!(headers["authorization"], "Bearer token");
    }

    #[test]
    fn test_restricted_headers_filtered_in_any_case() {
        assert!(is_restricted("HOST"));
        assert!(is_restricted("Content-LENGTH"));
        assert!(is_restricted("upgrade"));
        assert!(!is_restricted("x-host"));
        assert!(!is_restricted("transfer-encoding"));
    }

    #[test]
    fn test_multi_value_headers_forwarded_in_order() {
        let fwd = forwarder("http://backend.example.com");
        let req = internal(
            "GET",
            "/x",
            &[
                ("Accept", &["application/json", "text/plain"]),
                ("X-Custom", &["value1", "value2", "value3"]),
            ],
            b"",
        );

        let built = fwd.build_request(&req).unwrap();
        let accept: Vec<_> = built.headers().get_all("accept").iter().collect();
        assert_eq!(accept, ["application/json", "text/plain"]);
        let custom: Vec<_> = built.headers().get_all("x-custom").iter().collect();
        assert_eq!(custom, ["value1", "value2", "value3"]);
    }

    #[test]
    fn test_body_only_when_present() {
        let fwd = forwarder("http://backend.example.com");

        let post = fwd.build_request(&internal("POST", "/x", &[], b"{\"k\":1}")).unwrap();
        let bytes = post.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(bytes, b"{\"k\":1}");

        let get = fwd.build_request(&internal("GET", "/x", &[], b"")).unwrap();
        assert!(get.body().is_none());
    }

    #[test]
    fn test_whitespace_in_path_is_invalid_target() {
        let fwd = forwarder("http://backend.com");
        let err = fwd
            .build_request(&internal("GET", "/invalid path with spaces", &[], b""))
            .unwrap_err();

        assert!(matches!(err, ForwardingError::InvalidTarget { .. }));
        assert!(err.to_string().starts_with("Failed to build valid backend request"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_dot_segments_are_invalid_target() {
        let fwd = forwarder("http://backend.com");
        for path in [
            "/test/../admin",
            "/test/%2e%2e/admin",
            "/test/./x",
            "/test/..\\admin",
        ] {
            let err = fwd.build_request(&internal("GET", path, &[], b"")).unwrap_err();
            assert!(matches!(err, ForwardingError::InvalidTarget { .. }), "{path}");
        }
    }

    #[test]
    fn test_path_sent_verbatim() {
        let fwd = forwarder("http://backend.com/base");
        for (path, sent) in [
            ("/a/b%2Fc", "/base/a/b%2Fc"),
            ("/a/...", "/base/a/..."),
            ("/a/%41", "/base/a/%41"),
            ("/a?next=../b", "/base/a"),
        ] {
            let built = fwd.build_request(&internal("GET", path, &[], b"")).unwrap();
            assert_eq!(built.url().path(), sent);
        }
    }

    #[test]
    fn test_unparsable_method_is_invalid_target() {
        let fwd = forwarder("http://backend.com");
        let err = fwd
            .build_request(&internal("BAD METHOD", "/x", &[], b""))
            .unwrap_err();
        assert!(matches!(err, ForwardingError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn test_interrupted_exchange_message_and_cause() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let join_err = handle.await.unwrap_err();

        let err = ForwardingError::from(join_err);
        assert!(err.to_string().starts_with("Request interrupted during forwarding"));
        assert!(err.source().unwrap().downcast_ref::<JoinError>().is_some());
    }

    #[tokio::test]
    async fn test_forward_round_trip_against_backend() {
        let (addr, seen) = recording_backend().await;
        let fwd = forwarder(&format!("http://{addr}/"));

        let req = internal(
            "POST",
            "/api/v1/items?sort=desc",
            &[
                ("Content-Type", &["application/json"]),
                ("X-Multi", &["a", "b"]),
                ("Host", &["spoofed.example.com"]),
            ],
            b"{\"name\":\"widget\"}",
        );

        let response = fwd.forward(req).await.unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(&response.body()[..], b"ok");

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        let call = &seen[0];
        assert_eq!(call.method, "POST");
        assert_eq!(call.uri, "/api/v1/items?sort=desc");
        assert_eq!(&call.body[..], b"{\"name\":\"widget\"}");
        assert_eq!(call.headers["content-type"], "application/json");
        let multi: Vec<_> = call.headers.get_all("x-multi").iter().collect();
        assert_eq!(multi, ["a", "b"]);
        assert_eq!(call.headers["host"], addr.to_string().as_str());
    }

    #[tokio::test]
    async fn test_backend_status_headers_body_copied_verbatim() {
        let app = Router::new().fallback(|| async {
            let mut headers = HeaderMap::new();
            headers.append("set-cookie", HeaderValue::from_static("a=1"));
            headers.append("set-cookie", HeaderValue::from_static("b=2"));
            headers.insert("x-backend", HeaderValue::from_static("primary"));
            (StatusCode::IM_A_TEAPOT, headers, "short and stout").into_response()
        });
        let addr = spawn_backend(app).await;

        let response = forwarder(&format!("http://{addr}"))
            .forward(internal("GET", "/teapot", &[], b""))
            .await
            .unwrap();

        assert_eq!(response.status_code(), 418);
        assert_eq!(&response.body()[..], b"short and stout");
        assert_eq!(response.headers().get_all("set-cookie").unwrap().len(), 2);
        assert_eq!(
            response.headers().get_all("x-backend").unwrap(),
            &[HeaderValue::from_static("primary")]
        );
    }

    #[tokio::test]
    async fn test_error_statuses_are_responses_not_failures() {
        let app = Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE });
        let addr = spawn_backend(app).await;

        let response = forwarder(&format!("http://{addr}"))
            .forward(internal("GET", "/x", &[], b""))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 503);
    }

    #[tokio::test]
    async fn test_large_response_body() {
        let app = Router::new().fallback(|| async { vec![7u8; 1024 * 1024] });
        let addr = spawn_backend(app).await;

        let response = forwarder(&format!("http://{addr}"))
            .forward(internal("GET", "/big", &[], b""))
            .await
            .unwrap();
        assert_eq!(response.body().len(), 1024 * 1024);
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = forwarder(&format!("http://{addr}"))
            .forward(internal("GET", "/x", &[], b""))
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardingError::Upstream(_)));
        assert!(err.to_string().starts_with("Upstream backend failure"));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_backend_timeout_is_upstream_failure() {
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        });
        let addr = spawn_backend(app).await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = HttpForwarder::new(client, &format!("http://{addr}"))
            .forward(internal("GET", "/slow", &[], b""))
            .await
            .unwrap_err();

        match err {
            ForwardingError::Upstream(e) => assert!(e.is_timeout()),
            other => panic!("expected upstream timeout, got {other:?}"),
        }
    }
}
