//! # Settlements Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Select the payment gateway and build the sibling-service facades
//! - Spawn the outbox relay worker
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settlements_hex::{
    SettlementService,
    inbound::HttpServer,
    outbound::{
        CulqiProvider, HttpEventBus, IzipayProvider, NotificationsHttpFacade, ProfilesHttpFacade,
        ServiceRequestsHttpFacade, StripeProvider, WorkOrdersHttpFacade,
    },
};
use settlements_repo::{EventRelay, build_repo};
use settlements_types::PaymentProvider;

use config::GatewayConfig;

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("settlements-service"), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,settlements_app=debug,settlements_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting settlements server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);
    tracing::info!("Payment gateway: {}", config.gateway_name());

    // Build repository (handles connection, migration and plan seeding)
    let repo = build_repo(&config.database_url).await?;

    // Gateway selected by configuration, not by code
    let gateway: Arc<dyn PaymentProvider> = match &config.gateway {
        GatewayConfig::Stripe { secret_key } => Arc::new(StripeProvider::new(secret_key.clone())),
        GatewayConfig::Culqi { secret_key } => Arc::new(CulqiProvider::new(secret_key.clone())),
        GatewayConfig::Izipay {
            api_base,
            shop_id,
            api_key,
        } => Arc::new(IzipayProvider::new(
            api_base.clone(),
            shop_id.clone(),
            api_key.clone(),
        )),
    };

    // Create the settlement service
    let service = SettlementService::new(
        repo.clone(),
        gateway,
        Arc::new(ProfilesHttpFacade::new(config.profiles_url.clone())),
        Arc::new(WorkOrdersHttpFacade::new(config.work_orders_url.clone())),
        Arc::new(ServiceRequestsHttpFacade::new(
            config.service_requests_url.clone(),
        )),
        Arc::new(NotificationsHttpFacade::new(
            config.notifications_url.clone(),
        )),
        config.fee_percentage,
    );

    // Drain the event outbox to the message bus in the background
    let publisher = Arc::new(HttpEventBus::new(config.event_bus_url.clone()));
    tokio::spawn(EventRelay::new(repo, publisher).run());

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
