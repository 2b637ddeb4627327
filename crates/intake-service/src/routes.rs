//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{events, health, links, promos};
use crate::state::AppState;

/// Maximum concurrent requests for the event endpoint. One chat transport
/// update becomes one request, so this is the effective user-event
/// parallelism.
const EVENT_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent requests for the administration endpoints.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Events (gateway API key)
/// - `POST /v1/events` - Apply one inbound conversation event
///
/// ## Administration (admin API key)
/// - `GET|POST /v1/promo-codes`, `PATCH|DELETE /v1/promo-codes/:id`
/// - `GET|POST /v1/links`, `PATCH|DELETE /v1/links/:id`
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let event_routes = Router::new()
        .route("/events", post(events::handle_event))
        .layer(ConcurrencyLimitLayer::new(EVENT_MAX_CONCURRENT_REQUESTS));

    let admin_routes = Router::new()
        .route(
            "/promo-codes",
            get(promos::list_promo_codes).post(promos::create_promo_code),
        )
        .route(
            "/promo-codes/:id",
            patch(promos::update_promo_code).delete(promos::delete_promo_code),
        )
        .route("/links", get(links::list_links).post(links::create_link))
        .route(
            "/links/:id",
            patch(links::update_link).delete(links::delete_link),
        )
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", event_routes.merge(admin_routes))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}
