//! # PIX Checkout Proxy
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Build the gateway adapter (upstream processor or sandbox)
//! - Create the PIX service
//! - Start the HTTP server

mod config;

use anyhow::Context;
use axum::http::HeaderValue;
use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, LogFormat};
use pix_gateway::build_gateway;
use pix_hex::{PixService, inbound::HttpServer};

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("failed to create OTLP span exporter")?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("pix-checkout-proxy"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Export traces only when a collector is configured
    let otel = if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        Some(init_tracer()?)
    } else {
        None
    };
    let telemetry = otel
        .as_ref()
        .map(|(tracer, _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,pix_app=debug,pix_hex=debug,pix_gateway=debug".into()
            }),
        )
        .with(json)
        .with(pretty)
        .with(telemetry)
        .init();

    tracing::info!("Starting PIX checkout proxy on port {}", config.port);
    tracing::info!(
        mode = ?config.gateway.mode,
        upstream = ?config.gateway.upstream,
        validation = ?config.validation,
        "Gateway configuration"
    );

    // Refuses to start in upstream mode without a secret
    let gateway = build_gateway(config.gateway).context("failed to build PIX gateway")?;

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let service = PixService::new(gateway, config.validation);
    let server = HttpServer::with_rate_limit(service, config.requests_per_minute)
        .with_allowed_origins(origins);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some((_, provider)) = otel {
        let _ = provider.shutdown();
    }
    Ok(())
}
