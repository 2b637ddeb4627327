//! Conversational intake service.
//!
//! This crate provides the HTTP service around the intake platform:
//!
//! - The conversation engine driving the per-user intake flow
//! - Promo code redemption and reconciliation
//! - Operator notification delivery and the daily catch-up sweep
//! - Administration endpoints for promo codes and referral links
//!
//! # Authentication
//!
//! Two shared-secret header keys protect the surface:
//!
//! 1. **`x-api-key`** - presented by the chat gateway on inbound events
//! 2. **`x-admin-key`** - presented by operators on administration requests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for the router

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod notify;
pub mod reconciler;
pub mod routes;
pub mod session;
pub mod state;
pub mod sweep;

pub use config::ServiceConfig;
pub use engine::IntakeEngine;
pub use error::ApiError;
pub use events::{EventResponse, InboundEvent};
pub use gateway::GatewayClient;
pub use notify::{DeliveryError, Notifier, NotifyDispatcher};
pub use reconciler::{PromoReconciler, Redemption};
pub use routes::create_router;
pub use state::AppState;
pub use sweep::spawn_daily_sweep;
