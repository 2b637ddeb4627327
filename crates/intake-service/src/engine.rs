//! The conversation engine.
//!
//! Routes inbound events to the right per-user session, drives the intake
//! state machine, and runs the completion pipeline. The pipeline order is
//! load-bearing: the submission must exist before redemptions are attached,
//! and redemptions must be attached before the report text is composed, so
//! the message operators receive includes every attached code.

use std::sync::Arc;

use intake_core::{FlowInput, FlowState, IntakeAnswers, Prompt, UserId};
use intake_store::{Ledger, Result};

use crate::config::ServiceConfig;
use crate::events::InboundEvent;
use crate::notify::NotifyDispatcher;
use crate::reconciler::{PromoReconciler, Redemption};
use crate::session::{Conversation, SessionMap};

/// Stable option ids used on the main menu.
pub mod menu {
    /// Start the intake flow.
    pub const BEGIN_INTAKE: &str = "begin_intake";
    /// Enter a promo code.
    pub const ENTER_PROMO: &str = "enter_promo";
    /// Show cooperation contacts.
    pub const COOPERATION: &str = "cooperation";
}

const WELCOME_TEXT: &str = "Welcome! Our coaches build personal training and \
nutrition plans around your goals: muscle gain, weight loss, or getting back \
in shape after a break.\n\nChoose an option below to get started.";

/// Drives every user conversation.
pub struct IntakeEngine {
    ledger: Arc<dyn Ledger>,
    reconciler: PromoReconciler,
    dispatcher: NotifyDispatcher,
    sessions: SessionMap,
    config: ServiceConfig,
}

impl IntakeEngine {
    /// Create an engine over the given collaborators.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        dispatcher: NotifyDispatcher,
        config: ServiceConfig,
    ) -> Self {
        let reconciler = PromoReconciler::new(Arc::clone(&ledger));
        Self {
            ledger,
            reconciler,
            dispatcher,
            sessions: SessionMap::new(),
            config,
        }
    }

    /// Apply one inbound event and return the prompts to render.
    ///
    /// Events for the same user are serialized on the per-user session
    /// lock; events for different users run concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure faults, in which case the
    /// event was not applied and is safe to resend.
    pub async fn handle(&self, event: InboundEvent) -> Result<Vec<Prompt>> {
        let user_id = event.user_id();
        let slot = self.sessions.acquire(user_id);

        let result = {
            let mut session = slot.lock().await;
            self.dispatch(&mut session, event).await
        };

        self.sessions.release(user_id, &slot);
        result
    }

    async fn dispatch(
        &self,
        session: &mut Option<Conversation>,
        event: InboundEvent,
    ) -> Result<Vec<Prompt>> {
        match event {
            InboundEvent::StartConversation {
                user_id,
                username,
                first_name,
                attribution,
                referral_slug,
            } => {
                self.start_conversation(user_id, username, first_name, attribution, referral_slug)
                    .await
            }
            InboundEvent::SelectOption { user_id, option_id } => {
                self.select_option(session, user_id, &option_id).await
            }
            InboundEvent::SubmitAnswer { user_id, text } => {
                self.submit_answer(session, user_id, &text).await
            }
            InboundEvent::Skip { user_id } => match session.take() {
                Some(Conversation::Intake(state)) => {
                    self.advance_intake(session, user_id, state, FlowInput::Skip)
                        .await
                }
                other => {
                    *session = other;
                    Ok(vec![main_menu("Nothing to skip right now. Choose an option:")])
                }
            },
            InboundEvent::Cancel { user_id } => {
                if session.take().is_some() {
                    tracing::info!(user_id = %user_id, "Session cancelled");
                }
                Ok(vec![main_menu("Cancelled. Choose an option:")])
            }
        }
    }

    async fn start_conversation(
        &self,
        user_id: UserId,
        username: Option<String>,
        first_name: Option<String>,
        attribution: intake_core::Attribution,
        referral_slug: Option<String>,
    ) -> Result<Vec<Prompt>> {
        let profile = intake_core::UserProfile {
            username,
            first_name,
        };
        let (_, created) = self
            .ledger
            .get_or_create_user(user_id, &profile, &attribution)
            .await?;
        if created {
            tracing::info!(user_id = %user_id, "User created");
        }

        if let Some(slug) = referral_slug {
            match self.ledger.record_click(&slug, user_id).await? {
                Some(link) => {
                    tracing::info!(user_id = %user_id, slug = %link.slug, "Referral click recorded");
                }
                None => tracing::warn!(slug = %slug, "Unknown referral slug"),
            }
        }

        Ok(vec![main_menu(WELCOME_TEXT)])
    }

    async fn select_option(
        &self,
        session: &mut Option<Conversation>,
        user_id: UserId,
        option_id: &str,
    ) -> Result<Vec<Prompt>> {
        match option_id {
            menu::BEGIN_INTAKE => {
                let state = FlowState::first();
                let prompt = state.prompt();
                *session = Some(Conversation::Intake(state));
                Ok(vec![prompt])
            }
            menu::ENTER_PROMO => {
                *session = Some(Conversation::AwaitingPromoCode);
                Ok(vec![Prompt::text("Enter your promo code:")])
            }
            menu::COOPERATION => Ok(vec![Prompt::text(format!(
                "For cooperation inquiries:\n\nPhone: {}\nWebsite: {}",
                self.config.contact_phone, self.config.contact_website
            ))]),
            _ => match session.take() {
                Some(Conversation::Intake(state)) => {
                    self.advance_intake(session, user_id, state, FlowInput::Option(option_id))
                        .await
                }
                other => {
                    *session = other;
                    Ok(vec![main_menu("Choose an option:")])
                }
            },
        }
    }

    async fn submit_answer(
        &self,
        session: &mut Option<Conversation>,
        user_id: UserId,
        text: &str,
    ) -> Result<Vec<Prompt>> {
        match session.take() {
            Some(Conversation::AwaitingPromoCode) => {
                // The promo mini-session ends after one attempt either way;
                // only a store fault keeps it open for a resend.
                match self.reconciler.redeem(user_id, text).await {
                    Ok(outcome) => Ok(vec![promo_reply(&outcome)]),
                    Err(e) => {
                        *session = Some(Conversation::AwaitingPromoCode);
                        Err(e)
                    }
                }
            }
            Some(Conversation::Intake(state)) => {
                self.advance_intake(session, user_id, state, FlowInput::Text(text))
                    .await
            }
            None => Ok(vec![main_menu("Choose an option:")]),
        }
    }

    async fn advance_intake(
        &self,
        session: &mut Option<Conversation>,
        user_id: UserId,
        state: FlowState,
        input: FlowInput<'_>,
    ) -> Result<Vec<Prompt>> {
        // Keep a copy so a completion that fails on the store leaves the
        // session where it was; the user's last input can then be resent.
        let checkpoint = state.clone();

        match state.apply(input) {
            intake_core::Step::Retry { state, prompt }
            | intake_core::Step::Advance { state, prompt } => {
                *session = Some(Conversation::Intake(state));
                Ok(vec![prompt])
            }
            intake_core::Step::Complete { answers } => {
                match self.complete_intake(user_id, answers).await {
                    Ok(prompts) => {
                        *session = None;
                        Ok(prompts)
                    }
                    Err(e) => {
                        *session = Some(Conversation::Intake(checkpoint));
                        Err(e)
                    }
                }
            }
        }
    }

    /// The terminal sequence of a completed flow, strictly in order:
    /// persist, attach redemptions, re-read with codes, deliver, mark
    /// reported.
    async fn complete_intake(
        &self,
        user_id: UserId,
        answers: IntakeAnswers,
    ) -> Result<Vec<Prompt>> {
        let submission_id = self.ledger.create_submission(user_id, &answers).await?;
        tracing::info!(user_id = %user_id, submission_id = %submission_id, "Submission created");

        let attached = self.reconciler.attach(user_id, submission_id).await?;
        if attached > 0 {
            tracing::info!(
                submission_id = %submission_id,
                attached,
                "Promo redemptions attached"
            );
        }

        match self.ledger.submission_with_codes(submission_id).await? {
            Some(report) => {
                self.dispatcher.deliver_now(&report).await;
                self.ledger
                    .mark_submissions_reported(&[submission_id])
                    .await?;
            }
            None => {
                tracing::warn!(
                    submission_id = %submission_id,
                    "Submission vanished before delivery, leaving it to the sweep"
                );
            }
        }

        Ok(vec![Prompt::text(
            "Thank you! We will contact you shortly.",
        )])
    }
}

fn main_menu(text: &str) -> Prompt {
    Prompt::with_options(
        text,
        &[
            (menu::BEGIN_INTAKE, "Start training"),
            (menu::ENTER_PROMO, "Promo code"),
            (menu::COOPERATION, "Cooperation"),
        ],
    )
}

fn promo_reply(outcome: &Redemption) -> Prompt {
    match outcome {
        Redemption::Applied { code, description } => Prompt::text(format!(
            "Promo code '{code}' applied!\n\nDescription: {}",
            description.as_deref().unwrap_or("No description")
        )),
        Redemption::NotFound => {
            Prompt::text("Promo code not found. Please check the spelling.")
        }
        Redemption::AlreadyUsed => Prompt::text("This promo code has already been used."),
    }
}
