//! l7-guardian: allowlist-guarded reverse proxy in front of a single backend.

mod config;
mod guard;
mod mapper;
mod model;
mod pipeline;
mod proxy;
mod server;

use std::sync::Arc;

use config::GuardianConfig;
use guard::AdmissionGuard;
use mapper::RequestMapper;
use pipeline::Pipeline;
use proxy::HttpForwarder;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("GUARDIAN_CONFIG").ok())
        .unwrap_or_else(|| "guardian.toml".to_string());

    let backend_url_override = args
        .iter()
        .position(|a| a == "--backend-url")
        .and_then(|i| args.get(i + 1).cloned());

    let mut config = GuardianConfig::load(&config_path)?;

    // CLI overrides take precedence over TOML and env vars
    if let Some(url) = backend_url_override {
        config.backend.url = url;
        config.validate()?;
    }

    // The gRPC exporter needs a reactor context, so the runtime comes first
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = guardian_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            backend_url = %config.backend.url,
            allowed_paths = ?config.security.allowed_paths,
            max_body_size = config.limits.max_body_size,
            otlp_export = tracing_guard.exporting(),
            "Starting l7-guardian"
        );

        run(config).await
    })
}

async fn run(config: GuardianConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.backend.connect_timeout())
        .timeout(config.backend.timeout())
        .build()?;

    let pipeline = Pipeline::new(
        RequestMapper::new(config.limits.max_body_size),
        HttpForwarder::new(client, &config.backend.url),
    );
    let guard = AdmissionGuard::from_prefixes(&config.security.allowed_paths);
    if guard.is_empty() {
        anyhow::bail!("security.allowed_paths admits no path");
    }
    tracing::info!(prefixes = guard.len(), "Allowlist loaded");
    let guard = Arc::new(guard);

    server::run(&config.server.listen_address, server::router(guard, pipeline)).await
}
