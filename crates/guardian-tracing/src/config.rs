//! Tracing configuration types.

use serde::Deserialize;

/// Logging and span-export settings, read from the `[tracing]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    /// Service name reported to the OTLP collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP collector endpoint (e.g. "http://otel-collector:4317").
    /// When `None`, span export is disabled and only fmt logging is used.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Transport protocol for OTLP export.
    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Log level filter (e.g. "info", "guardian_proxy=debug,info").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit ANSI colour codes in the fmt layer.
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

/// OTLP transport protocol.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

fn default_service_name() -> String {
    "l7-guardian".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            protocol: OtlpProtocol::default(),
            log_level: default_log_level(),
            ansi: default_ansi(),
        }
    }
}
