//! Intake Service - conversational intake over a chat gateway.
//!
//! This is the main entry point for the intake service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intake_service::{
    create_router, spawn_daily_sweep, AppState, GatewayClient, Notifier, ServiceConfig,
};
use intake_store::PgLedger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,intake_service=debug,intake_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Intake Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        operators = config.operator_ids.len(),
        sweep_at = %config.sweep_at,
        gateway_configured = %config.gateway_url.is_some(),
        "Service configuration loaded"
    );

    // Connect to PostgreSQL and run migrations
    tracing::info!("Connecting to the database");
    let ledger = Arc::new(
        PgLedger::connect(&config.database_url, config.database_max_connections).await?,
    );

    // Gateway client for operator notifications, if configured
    let notifier: Option<Arc<dyn Notifier>> = config.gateway_url.as_ref().map(|url| {
        tracing::info!(gateway_url = %url, "Gateway notifications enabled");
        Arc::new(GatewayClient::new(url, config.gateway_token.clone())) as Arc<dyn Notifier>
    });

    // Build app state
    let state = Arc::new(AppState::new(ledger, notifier, config.clone()));

    // Daily catch-up sweep; detached, it lives as long as the process
    let _sweep = spawn_daily_sweep(Arc::clone(&state));

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
