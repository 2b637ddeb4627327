//! Referral link administration handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use intake_core::{is_valid_slug, LinkId, LinkUpdate, LinkWithStats};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Request to create a referral link.
#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    /// The slug; stored lowercase.
    pub slug: String,
    /// Description for operators.
    #[serde(default)]
    pub description: Option<String>,
}

/// Response for a created link.
#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    /// The new link's id.
    pub id: LinkId,
}

/// Create a referral link.
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<CreateLinkRequest>,
) -> Result<Json<CreateLinkResponse>, ApiError> {
    let slug = body.slug.trim();
    if !is_valid_slug(slug) {
        return Err(ApiError::BadRequest(
            "Slug may contain only letters, digits, - and _".into(),
        ));
    }

    let id = state
        .ledger
        .create_link(slug, body.description.as_deref())
        .await?;

    tracing::info!(link_id = %id, slug = %slug, "Referral link created");
    Ok(Json(CreateLinkResponse { id }))
}

/// List every link with click aggregates.
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<Vec<LinkWithStats>>, ApiError> {
    Ok(Json(state.ledger.list_links().await?))
}

/// Apply a partial update to a link.
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(update): Json<LinkUpdate>,
) -> Result<StatusCode, ApiError> {
    if let Some(slug) = &update.slug {
        if !is_valid_slug(slug.trim()) {
            return Err(ApiError::BadRequest(
                "Slug may contain only letters, digits, - and _".into(),
            ));
        }
    }

    state.ledger.update_link(LinkId::new(id), &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a link and its clicks.
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.ledger.delete_link(LinkId::new(id)).await?;
    tracing::info!(link_id = %id, "Referral link deleted");
    Ok(StatusCode::NO_CONTENT)
}
