//! Promo code administration handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use intake_core::{PromoCodeId, PromoCodeUpdate, PromoCodeWithUsage};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Request to create a promo code.
#[derive(Debug, Deserialize)]
pub struct CreatePromoCodeRequest {
    /// The code string; stored uppercase.
    pub code: String,
    /// Description shown to users on redemption.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the code may be attached to at most one submission.
    #[serde(default)]
    pub single_use: bool,
}

/// Response for a created promo code.
#[derive(Debug, Serialize)]
pub struct CreatePromoCodeResponse {
    /// The new code's id.
    pub id: PromoCodeId,
}

/// Create a promo code.
pub async fn create_promo_code(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<CreatePromoCodeRequest>,
) -> Result<Json<CreatePromoCodeResponse>, ApiError> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("Code must not be empty".into()));
    }

    let id = state
        .ledger
        .create_promo_code(code, body.description.as_deref(), body.single_use)
        .await?;

    tracing::info!(promo_id = %id, code = %code, single_use = body.single_use, "Promo code created");
    Ok(Json(CreatePromoCodeResponse { id }))
}

/// List every promo code with usage counts.
pub async fn list_promo_codes(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<Vec<PromoCodeWithUsage>>, ApiError> {
    Ok(Json(state.ledger.list_promo_codes().await?))
}

/// Apply a partial update to a promo code.
pub async fn update_promo_code(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(update): Json<PromoCodeUpdate>,
) -> Result<StatusCode, ApiError> {
    if let Some(code) = &update.code {
        if code.trim().is_empty() {
            return Err(ApiError::BadRequest("Code must not be empty".into()));
        }
    }

    state
        .ledger
        .update_promo_code(PromoCodeId::new(id), &update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a promo code and its redemptions.
pub async fn delete_promo_code(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.ledger.delete_promo_code(PromoCodeId::new(id)).await?;
    tracing::info!(promo_id = %id, "Promo code deleted");
    Ok(StatusCode::NO_CONTENT)
}
