//! Span constructors for the guarded request pipeline.

/// Span covering one admitted request from ingress to egress.
///
/// Usage: `let span = guarded_request_span!(request_id, method, path);`
///
/// `status` and `latency_ms` are recorded by the orchestrator once the
/// client-facing response is known.
#[macro_export]
macro_rules! guarded_request_span {
    ($request_id:expr, $method:expr, $path:expr) => {
        tracing::info_span!(
            "guarded_request",
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Span covering the single backend call made by the forwarder.
#[macro_export]
macro_rules! backend_forward_span {
    ($method:expr, $target:expr) => {
        tracing::info_span!(
            "backend_forward",
            method = %$method,
            target = %$target,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}
