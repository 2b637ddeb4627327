//! Application state.

use std::sync::Arc;

use intake_store::Ledger;

use crate::config::ServiceConfig;
use crate::engine::IntakeEngine;
use crate::notify::{Notifier, NotifyDispatcher};

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub ledger: Arc<dyn Ledger>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// The conversation engine.
    pub engine: IntakeEngine,

    /// Submission delivery, shared with the daily sweep.
    pub dispatcher: NotifyDispatcher,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        notifier: Option<Arc<dyn Notifier>>,
        config: ServiceConfig,
    ) -> Self {
        if notifier.is_none() {
            tracing::warn!("Gateway not configured - operator notifications will not be sent");
        }
        if config.operator_ids.is_empty() {
            tracing::warn!("No operators configured - completed intakes will not be reported");
        }

        let dispatcher = NotifyDispatcher::new(notifier, config.operator_ids.clone());
        let engine = IntakeEngine::new(Arc::clone(&ledger), dispatcher.clone(), config.clone());

        Self {
            ledger,
            config,
            engine,
            dispatcher,
        }
    }
}
