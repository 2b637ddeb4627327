//! Authentication extractors.
//!
//! Two shared-secret header keys protect the service: the chat gateway
//! presents `x-api-key` on inbound events, and operators present
//! `x-admin-key` on the administration endpoints. An unset key disables the
//! corresponding surface entirely rather than leaving it open.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Proof that the request came from the chat gateway.
#[derive(Debug, Clone, Copy)]
pub struct GatewayAuth;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for GatewayAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_key(parts, "x-api-key", state.config.gateway_api_key.as_deref())?;
        Ok(Self)
    }
}

/// Proof that the request came from an operator.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_key(parts, "x-admin-key", state.config.admin_api_key.as_deref())?;
        Ok(Self)
    }
}

fn require_key(parts: &Parts, header: &str, expected: Option<&str>) -> Result<(), ApiError> {
    let expected = expected.ok_or(ApiError::Unauthorized)?;
    let presented = parts
        .headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if presented != expected {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
