//! Operator notification delivery.
//!
//! A completed submission is rendered once and fanned out to every
//! configured operator. Delivery is best-effort: one operator being
//! unreachable is logged and does not block the others, and the caller
//! flips the reported flag after the fan-out returns either way — the flag
//! records "attempted", not "confirmed read". The daily sweep re-delivers
//! anything that never reached the mark-reported step.

use std::sync::Arc;

use async_trait::async_trait;

use intake_core::{OperatorId, SubmissionId, SubmissionWithCodes};
use intake_store::{Ledger, Result};

/// Error type for a single operator delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the message.
    #[error("gateway error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
}

/// The outbound seam to the chat transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one text message to one operator.
    async fn notify(&self, operator: OperatorId, text: &str) -> std::result::Result<(), DeliveryError>;
}

/// Delivers completed submissions to operators, synchronously on completion
/// and via the daily catch-up sweep.
#[derive(Clone)]
pub struct NotifyDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    operators: Vec<OperatorId>,
}

impl NotifyDispatcher {
    /// Create a dispatcher. A `None` notifier disables delivery entirely
    /// (the caller is expected to have warned about it at startup).
    #[must_use]
    pub fn new(notifier: Option<Arc<dyn Notifier>>, operators: Vec<OperatorId>) -> Self {
        Self {
            notifier,
            operators,
        }
    }

    /// Render and send one submission report to every operator.
    ///
    /// Individual delivery failures are logged, never propagated.
    pub async fn deliver_now(&self, report: &SubmissionWithCodes) {
        if self.operators.is_empty() {
            return;
        }
        let Some(notifier) = &self.notifier else {
            tracing::warn!(
                submission_id = %report.submission.id,
                "Gateway not configured, submission report not delivered"
            );
            return;
        };

        let text = render_report(report);
        for operator in &self.operators {
            if let Err(e) = notifier.notify(*operator, &text).await {
                tracing::error!(
                    operator = %operator,
                    submission_id = %report.submission.id,
                    error = %e,
                    "Failed to deliver submission report"
                );
            }
        }
    }

    /// Deliver every unreported submission and mark the batch reported.
    ///
    /// Returns the number of submissions swept. Safe to run with nothing
    /// pending and concurrently with new completions.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or the batch cannot be
    /// marked; already-attempted deliveries are not rolled back (the next
    /// sweep will retry them).
    pub async fn sweep_unreported(&self, ledger: &dyn Ledger) -> Result<usize> {
        let pending = ledger.unreported_submissions().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let ids: Vec<SubmissionId> = pending.iter().map(|r| r.submission.id).collect();
        for report in &pending {
            self.deliver_now(report).await;
        }
        ledger.mark_submissions_reported(&ids).await?;

        Ok(ids.len())
    }
}

/// Render the fixed submission report template.
pub fn render_report(report: &SubmissionWithCodes) -> String {
    let mut text = String::from("New intake submission:\n\n");

    let name = report.first_name.as_deref().unwrap_or("Not provided");
    text.push_str(&format!("User: {name}"));
    if let Some(username) = &report.username {
        text.push_str(&format!(" (@{username})"));
    }
    text.push_str(&format!("\nID: {}\n\n", report.submission.user_id));

    let answers = &report.submission.answers;
    if let Some(gender) = answers.gender {
        text.push_str(&format!("Gender: {gender}\n"));
    }
    if let Some(age) = answers.age {
        text.push_str(&format!("Age: {age}\n"));
    }
    if let Some(weight) = answers.weight {
        text.push_str(&format!("Weight: {weight} kg\n"));
    }
    if let Some(workouts) = answers.workouts_per_week {
        text.push_str(&format!("Workouts per week: {workouts}\n"));
    }
    if let Some(diet) = &answers.diet {
        text.push_str(&format!("Diet: {diet}\n"));
    }
    if let Some(note) = &answers.health_note {
        text.push_str(&format!("Health notes: {note}\n"));
    }

    if !report.promo_codes.is_empty() {
        text.push_str(&format!("\nPromo codes: {}\n", report.promo_codes.join(", ")));
    }

    text.push_str(&format!(
        "\nDate: {}",
        report.submission.created_at.format("%d.%m.%Y %H:%M")
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use intake_core::{Gender, IntakeAnswers, Submission, UserId};

    fn report() -> SubmissionWithCodes {
        SubmissionWithCodes {
            submission: Submission {
                id: SubmissionId::new(7),
                user_id: UserId::new(42),
                answers: IntakeAnswers {
                    gender: Some(Gender::Male),
                    age: Some(29),
                    weight: Some(82.0),
                    workouts_per_week: Some(4),
                    diet: None,
                    health_note: None,
                },
                reported: false,
                created_at: Utc.with_ymd_and_hms(2025, 6, 1, 18, 30, 0).unwrap(),
            },
            username: Some("sam".into()),
            first_name: Some("Sam".into()),
            promo_codes: vec!["SUMMER".into()],
        }
    }

    #[test]
    fn report_includes_answered_fields_and_codes() {
        let text = render_report(&report());
        assert!(text.contains("User: Sam (@sam)"));
        assert!(text.contains("ID: 42"));
        assert!(text.contains("Gender: Male"));
        assert!(text.contains("Age: 29"));
        assert!(text.contains("Weight: 82 kg"));
        assert!(text.contains("Workouts per week: 4"));
        assert!(text.contains("Promo codes: SUMMER"));
        assert!(text.contains("Date: 01.06.2025 18:30"));
    }

    #[test]
    fn report_omits_skipped_fields() {
        let text = render_report(&report());
        assert!(!text.contains("Diet:"));
        assert!(!text.contains("Health notes:"));
    }

    #[test]
    fn report_without_handle_or_codes() {
        let mut report = report();
        report.username = None;
        report.first_name = None;
        report.promo_codes.clear();
        let text = render_report(&report);
        assert!(text.contains("User: Not provided\n"));
        assert!(!text.contains('@'));
        assert!(!text.contains("Promo codes:"));
    }
}
