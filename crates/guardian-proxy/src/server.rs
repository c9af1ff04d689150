//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::guard::{admission_guard, AdmissionGuard};
use crate::mapper::Emitter;
use crate::pipeline::{json_response, Pipeline};
use crate::proxy::{request_id, Forwarder};

/// Body of the 400 sent when the request body could not be read.
pub const BODY_READ_FAILED_JSON: &[u8] = br#"{"error":"body_read_failed"}"#;

/// Build the guarded router.
///
/// Every method and path lands on the proxy fallback, but only after the
/// admission guard has run. Denied requests never touch the pipeline.
pub fn router<F, E>(guard: Arc<AdmissionGuard>, pipeline: Pipeline<F, E>) -> Router
where
    F: Forwarder,
    E: Emitter,
{
    Router::new()
        .fallback(handle_proxy::<F, E>)
        .with_state(Arc::new(pipeline))
        .layer(middleware::from_fn_with_state(guard, admission_guard))
        .layer(TraceLayer::new_for_http())
}

/// Bind `listen_address` and serve `app` until Ctrl+C.
pub async fn run(listen_address: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("binding {listen_address}"))?;
    tracing::info!(address = %listen_address, "l7-guardian listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("l7-guardian shut down gracefully");
    Ok(())
}

/// Catch-all handler for admitted requests.
async fn handle_proxy<F, E>(State(pipeline): State<Arc<Pipeline<F, E>>>, request: Request) -> Response
where
    F: Forwarder,
    E: Emitter,
{
    let request_id = request_id::from_headers(request.headers());
    let span = guardian_tracing::guarded_request_span!(
        request_id,
        request.method(),
        request.uri().path()
    );
    let start = Instant::now();

    async move {
        let response = match pipeline.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read request body");
                json_response(StatusCode::BAD_REQUEST, BODY_READ_FAILED_JSON)
            }
        };

        let span = tracing::Span::current();
        span.record("status", response.status().as_u16());
        span.record("latency_ms", start.elapsed().as_millis() as u64);
        response
    }
    .instrument(span)
    .await
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed.
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
