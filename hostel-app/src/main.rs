//! # Hostel Payments Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository and gateway adapters
//! - Create the application services
//! - Spawn the outbox worker and the due-payment job
//! - Start the HTTP server

mod config;
mod jobs;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hostel_hex::{Services, inbound::HttpServer};
use hostel_repo::{WebhookWorker, build_gateway, build_repo};

use config::{Config, LogFormat};
use jobs::DueJobs;

const DEFAULT_LOG_FILTER: &str = "info,hostel_app=debug,hostel_hex=debug";

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // gRPC exporter with batch processing (non-blocking); reads OTEL_EXPORTER_OTLP_ENDPOINT
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("hostel-payments"), provider))
}

/// Installs the subscriber. Returns the OTLP provider when export is enabled.
fn init_tracing(config: &Config) -> anyhow::Result<Option<sdktrace::SdkTracerProvider>> {
    let (telemetry, provider) = match config.otlp_endpoint {
        Some(_) => {
            let (tracer, provider) = init_tracer()?;
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(provider),
            )
        }
        None => (None, None),
    };

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(json)
        .with(pretty)
        .with(telemetry)
        .init();

    Ok(provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let otel_provider = init_tracing(&config)?;

    tracing::info!("Starting hostel payments server on port {}", config.port);

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);
    tracing::info!(backend = repo.backend(), "Database ready");

    let gateway = Arc::new(build_gateway(&config.gateway)?);
    tracing::info!(mode = ?config.gateway.mode, "Payment gateway ready");

    if config.webhook_worker_enabled {
        tokio::spawn(WebhookWorker::new(repo.clone()).run());
    }

    if let Some(every) = config.jobs_interval {
        let services = Services::from_shared(repo.clone(), gateway.clone(), config.reminders);
        tokio::spawn(DueJobs::new(services, every).run());
    }

    let services = Services::from_shared(repo, gateway, config.reminders);
    let server = HttpServer::with_rate_limit(services, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some(provider) = otel_provider {
        let _ = provider.shutdown();
    }
    Ok(())
}
