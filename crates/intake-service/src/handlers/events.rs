//! Inbound conversation event handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::GatewayAuth;
use crate::error::ApiError;
use crate::events::{EventResponse, InboundEvent};
use crate::state::AppState;

/// Apply one inbound event and return the prompts to render.
pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    _auth: GatewayAuth,
    Json(event): Json<InboundEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    tracing::debug!(user_id = %event.user_id(), "Processing inbound event");

    let prompts = state.engine.handle(event).await?;
    Ok(Json(EventResponse { prompts }))
}
