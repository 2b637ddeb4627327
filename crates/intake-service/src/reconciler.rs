//! Promo code redemption and reconciliation.
//!
//! Redemption is a two-phase affair: `redeem` records a pending claim while
//! the user is still talking, and `attach` binds every pending claim to the
//! submission the user eventually completes. The single-use guarantee is
//! enforced by the ledger's conditional writes; this module's check-then-act
//! sequences are deliberately racy and treat the final write's refusal as
//! the authoritative answer. No lock is ever held across the
//! reconciliation, so unrelated users are never serialized.

use std::sync::Arc;

use intake_core::{normalize_code, SubmissionId, UserId};
use intake_store::{Ledger, Result};

/// The outcome of a redemption attempt, surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// The code was recorded (or was already pending for this user).
    Applied {
        /// Canonical code string.
        code: String,
        /// The code's description.
        description: Option<String>,
    },

    /// No such code exists.
    NotFound,

    /// The code is single-use and some submission already claimed it.
    AlreadyUsed,
}

/// Validates and redeems promo codes, and attaches pending redemptions to
/// completed submissions.
#[derive(Clone)]
pub struct PromoReconciler {
    ledger: Arc<dyn Ledger>,
}

impl PromoReconciler {
    /// Create a reconciler over the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Redeem a raw user-entered code.
    ///
    /// Re-entering a code the user already holds pending is an idempotent
    /// no-op that reports success again.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure faults; every expected
    /// rejection is a [`Redemption`] variant.
    pub async fn redeem(&self, user_id: UserId, raw: &str) -> Result<Redemption> {
        let code = normalize_code(raw);
        let Some(promo) = self.ledger.find_promo_code(&code).await? else {
            return Ok(Redemption::NotFound);
        };

        // Re-entering a code the user already holds is a no-op success,
        // single-use or not.
        if self
            .ledger
            .has_pending_redemption(user_id, promo.id)
            .await?
        {
            return Ok(Redemption::Applied {
                code: promo.code,
                description: promo.description,
            });
        }

        // A single-use code claimed by anyone else, pending or attached, is
        // spent from this user's point of view.
        if promo.single_use && self.ledger.has_any_redemption(promo.id).await? {
            return Ok(Redemption::AlreadyUsed);
        }

        // A concurrent identical redeem may land first; the insert is
        // conflict-absorbing, which collapses both calls into one pending
        // row.
        self.ledger
            .insert_pending_redemption(user_id, promo.id)
            .await?;

        tracing::info!(user_id = %user_id, code = %promo.code, "Promo code redeemed");
        Ok(Redemption::Applied {
            code: promo.code,
            description: promo.description,
        })
    }

    /// Attach every pending redemption of the user to a submission.
    ///
    /// Returns the number actually attached. Codes that lost a single-use
    /// race in the meantime are skipped, not errors; calling with zero
    /// pending redemptions returns 0.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure faults.
    pub async fn attach(&self, user_id: UserId, submission_id: SubmissionId) -> Result<u32> {
        let pending = self.ledger.pending_redemptions(user_id).await?;

        let mut attached = 0;
        for redemption in pending {
            if redemption.single_use
                && self
                    .ledger
                    .has_attached_redemption(redemption.promo_code_id)
                    .await?
            {
                tracing::debug!(
                    user_id = %user_id,
                    promo_id = %redemption.promo_code_id,
                    "Single-use code already claimed elsewhere, skipping"
                );
                continue;
            }

            if self
                .ledger
                .insert_attached_redemption(user_id, redemption.promo_code_id, submission_id)
                .await?
            {
                attached += 1;
            } else {
                tracing::warn!(
                    user_id = %user_id,
                    promo_id = %redemption.promo_code_id,
                    submission_id = %submission_id,
                    "Lost the attach race, skipping"
                );
            }
        }

        Ok(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{Attribution, IntakeAnswers, UserProfile};
    use intake_store::MemLedger;

    async fn harness() -> (Arc<MemLedger>, PromoReconciler) {
        let ledger = Arc::new(MemLedger::new());
        let reconciler = PromoReconciler::new(Arc::clone(&ledger) as Arc<dyn Ledger>);
        (ledger, reconciler)
    }

    async fn seeded_user(ledger: &MemLedger, n: i64) -> UserId {
        let id = UserId::new(n);
        ledger
            .get_or_create_user(id, &UserProfile::default(), &Attribution::default())
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (_ledger, reconciler) = harness().await;
        let outcome = reconciler.redeem(UserId::new(1), "FAKE123").await.unwrap();
        assert_eq!(outcome, Redemption::NotFound);
    }

    #[tokio::test]
    async fn redeem_is_case_insensitive_and_idempotent() {
        let (ledger, reconciler) = harness().await;
        let alice = seeded_user(&ledger, 1).await;
        ledger
            .create_promo_code("SUMMER", Some("seasonal discount"), false)
            .await
            .unwrap();

        let first = reconciler.redeem(alice, " summer ").await.unwrap();
        let second = reconciler.redeem(alice, "Summer").await.unwrap();

        let expected = Redemption::Applied {
            code: "SUMMER".into(),
            description: Some("seasonal discount".into()),
        };
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(ledger.pending_redemptions(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn single_use_lifecycle() {
        let (ledger, reconciler) = harness().await;
        let alice = seeded_user(&ledger, 1).await;
        let bob = seeded_user(&ledger, 2).await;
        ledger
            .create_promo_code("VIP1", Some("vip"), true)
            .await
            .unwrap();

        let expected = Redemption::Applied {
            code: "VIP1".into(),
            description: Some("vip".into()),
        };

        // First redemption succeeds; from then on the code is spent for
        // everyone else, even before it is attached to a submission.
        assert_eq!(reconciler.redeem(alice, "VIP1").await.unwrap(), expected);
        assert_eq!(
            reconciler.redeem(bob, "vip1").await.unwrap(),
            Redemption::AlreadyUsed
        );

        // The holder re-entering the code is a no-op returning the same
        // description.
        assert_eq!(reconciler.redeem(alice, "VIP1").await.unwrap(), expected);

        let submission = ledger
            .create_submission(alice, &IntakeAnswers::default())
            .await
            .unwrap();
        assert_eq!(reconciler.attach(alice, submission).await.unwrap(), 1);

        // Attached now; still spent for other users.
        assert_eq!(
            reconciler.redeem(bob, "vip1").await.unwrap(),
            Redemption::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn attach_twice_is_idempotent() {
        let (ledger, reconciler) = harness().await;
        let alice = seeded_user(&ledger, 1).await;
        ledger
            .create_promo_code("SUMMER", None, false)
            .await
            .unwrap();
        ledger.create_promo_code("WINTER", None, false).await.unwrap();
        reconciler.redeem(alice, "SUMMER").await.unwrap();
        reconciler.redeem(alice, "WINTER").await.unwrap();

        let submission = ledger
            .create_submission(alice, &IntakeAnswers::default())
            .await
            .unwrap();

        assert_eq!(reconciler.attach(alice, submission).await.unwrap(), 2);
        assert_eq!(reconciler.attach(alice, submission).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn attach_with_no_pending_redemptions_is_a_no_op() {
        let (ledger, reconciler) = harness().await;
        let alice = seeded_user(&ledger, 1).await;
        let submission = ledger
            .create_submission(alice, &IntakeAnswers::default())
            .await
            .unwrap();
        assert_eq!(reconciler.attach(alice, submission).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn racing_users_never_attach_a_single_use_code_twice() {
        let (ledger, reconciler) = harness().await;
        ledger
            .create_promo_code("VIP1", None, true)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 1..=8 {
            let ledger = Arc::clone(&ledger);
            let reconciler = reconciler.clone();
            handles.push(tokio::spawn(async move {
                let user = seeded_user(&ledger, n).await;
                if !matches!(
                    reconciler.redeem(user, "VIP1").await.unwrap(),
                    Redemption::Applied { .. }
                ) {
                    return 0;
                }
                let submission = ledger
                    .create_submission(user, &IntakeAnswers::default())
                    .await
                    .unwrap();
                reconciler.attach(user, submission).await.unwrap()
            }));
        }

        let mut total_attached = 0;
        for handle in handles {
            total_attached += handle.await.unwrap();
        }
        assert_eq!(total_attached, 1);
    }
}
