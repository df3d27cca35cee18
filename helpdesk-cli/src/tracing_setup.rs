//! Logging for the helpdesk binary
//!
//! Console output always; OTLP span export when built with `telemetry`
//! and run with `--otel`. `RUST_LOG` overrides the built-in directives.
//!
//! Environment variables:
//!   RUST_LOG                          # Log filter
//!   OTEL_EXPORTER_OTLP_ENDPOINT       # OTLP endpoint (default: http://localhost:4317)
//!   OTEL_SERVICE_NAME                 # Service name (default: helpdesk)

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Crates whose own events `--debug` turns up
const HELPDESK_TARGETS: [&str; 3] = ["helpdesk", "helpdesk_core", "helpdesk_server"];

const DEFAULT_SERVICE_NAME: &str = "helpdesk";

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub debug: bool,
    pub otel: bool,
    /// `service.name` on exported spans
    pub service_name: String,
}

impl TracingConfig {
    pub fn new(debug: bool, otel: bool) -> Self {
        Self {
            debug,
            otel,
            service_name: service_name(std::env::var("OTEL_SERVICE_NAME").ok()),
        }
    }
}

fn service_name(from_env: Option<String>) -> String {
    from_env
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned())
}

/// Built-in filter. Debug raises the helpdesk crates and request traces,
/// but keeps sqlx statement logging at info.
fn directives(debug: bool) -> String {
    if !debug {
        return "info,sqlx=warn,tower_http=info".to_owned();
    }
    let mut parts = vec!["info".to_owned()];
    parts.extend(HELPDESK_TARGETS.iter().map(|t| format!("{}=debug", t)));
    parts.push("tower_http=debug".to_owned());
    parts.push("sqlx=info".to_owned());
    parts.join(",")
}

fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(debug)))
}

/// Console output only
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.debug))
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))?;
    tracing::debug!(service = %config.service_name, "console logging initialized");
    Ok(())
}

/// Console output plus OTLP span export
#[cfg(feature = "telemetry")]
pub fn init_tracing_with_otel(config: &TracingConfig) -> Result<()> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name = config.service_name.clone();

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()
        .map_err(|e| anyhow!("Failed to create OTLP exporter: {}", e))?;

    let resource = opentelemetry_sdk::Resource::new(vec![
        KeyValue::new("service.name", service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let provider = TracerProvider::builder()
        .with_batch_exporter(otlp_exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(DEFAULT_SERVICE_NAME);
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    // Dropping the provider would stop export
    let _ = opentelemetry::global::set_tracer_provider(provider);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.debug)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(config.debug))
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    tracing::info!(
        endpoint = %endpoint,
        service = %service_name,
        "OpenTelemetry tracing initialized"
    );

    Ok(())
}

/// Flush pending spans
#[cfg(feature = "telemetry")]
pub fn shutdown_otel() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(not(feature = "telemetry"))]
pub fn shutdown_otel() {}

/// Pick console-only or OTLP export from `config.otel`.
pub fn init(config: &TracingConfig) -> Result<()> {
    #[cfg(feature = "telemetry")]
    if config.otel {
        return init_tracing_with_otel(config);
    }

    init_tracing(config)?;
    #[cfg(not(feature = "telemetry"))]
    if config.otel {
        tracing::warn!("--otel ignored: built without the `telemetry` feature");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default() {
        let d = directives(false);
        assert!(d.starts_with("info"));
        assert!(d.contains("sqlx=warn"));
        assert!(!d.contains("debug"));
    }

    #[test]
    fn debug_raises_own_crates_only() {
        let d = directives(true);
        for target in HELPDESK_TARGETS {
            assert!(d.contains(&format!("{}=debug", target)));
        }
        assert!(d.contains("sqlx=info"));
        EnvFilter::try_new(&d).unwrap();
    }

    #[test]
    fn blank_service_name_falls_back() {
        assert_eq!(service_name(None), "helpdesk");
        assert_eq!(service_name(Some("  ".into())), "helpdesk");
        assert_eq!(service_name(Some("helpdesk-eu".into())), "helpdesk-eu");
    }
}
