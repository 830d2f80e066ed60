//! # Ledger Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize tracing, and OpenTelemetry export when an OTLP endpoint is set
//! - Initialize the repository adapter and the audit sink
//! - Create the ledger service
//! - Start the HTTP server

mod config;
mod seed;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry_sdk::{
    metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace as sdktrace,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_hex::{LedgerService, inbound::HttpServer};
use ledger_repo::{HttpAuditEmitter, KeyedMutex, TracingAuditEmitter, build_repo};
use ledger_types::AuditEmitter;

struct Telemetry {
    tracer: sdktrace::SdkTracerProvider,
    meter: SdkMeterProvider,
}

impl Telemetry {
    fn shutdown(self) {
        let _ = self.tracer.shutdown();
        let _ = self.meter.shutdown();
    }
}

/// Installs OTLP trace and metric exporters. The endpoint is read by the
/// exporters themselves from `OTEL_EXPORTER_OTLP_ENDPOINT`.
fn init_telemetry() -> anyhow::Result<(sdktrace::Tracer, Telemetry)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;
    let tracer_provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    // HTTP metrics from the router layer go through the global meter provider
    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;
    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();
    global::set_meter_provider(meter_provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((
        tracer_provider.tracer("ledger-service"),
        Telemetry {
            tracer: tracer_provider,
            meter: meter_provider,
        },
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let telemetry = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(_) => Some(init_telemetry()?),
        Err(_) => None,
    };
    let otel_layer = telemetry
        .as_ref()
        .map(|(tracer, _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ledger_app=debug,ledger_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting ledger server on port {}", config.port);
    tracing::info!(
        reference_currency = %config.reference_currency,
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        "Ledger settings"
    );

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url, config.lock_timeout).await?;

    if config.seed_demo {
        seed::seed_demo(&repo).await?;
    }

    // Audit sink: HTTP delivery in the background, or the log
    let (audit, audit_worker): (Arc<dyn AuditEmitter>, _) = match &config.audit_sink_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering audit events over HTTP");
            let (emitter, worker) = HttpAuditEmitter::new(url.clone(), config.audit_max_attempts);
            (Arc::new(emitter), Some(tokio::spawn(worker.run())))
        }
        None => (Arc::new(TracingAuditEmitter), None),
    };

    let locks = Arc::new(KeyedMutex::new(config.lock_timeout));
    let service = LedgerService::new(repo, audit, locks, config.reference_currency);

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // The server owned the last emitter, so the worker drains and stops
    if let Some(worker) = audit_worker {
        if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
            tracing::warn!("Audit worker did not drain in time, pending events dropped");
        }
    }

    // Ensure traces and metrics are flushed before exit
    if let Some((_, telemetry)) = telemetry {
        telemetry.shutdown();
    }
    Ok(())
}
