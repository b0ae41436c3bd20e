use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_shipping_api::carrier_client::HttpCarrierClient;
use rust_shipping_api::config::Config;
use rust_shipping_api::dispatch::Dispatcher;
use rust_shipping_api::handlers::{self, AppState};
use rust_shipping_api::validator::SchemaValidator;

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, compiles the payload schemas,
/// builds the carrier client and starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_shipping_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let validator = SchemaValidator::new()?;
    tracing::info!("Payload schemas compiled");

    let client = HttpCarrierClient::new(&config)?;
    tracing::info!(
        "✓ Carrier client initialized (timeout {}s)",
        config.carrier_timeout_secs
    );

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        dispatcher: Dispatcher::new(client, validator),
    });

    let app = handlers::router(app_state)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
