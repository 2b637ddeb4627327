//! Transport-agnostic inbound events and outbound instructions.
//!
//! The chat-transport gateway maps its native message/button updates onto
//! these events and renders the returned [`Prompt`] instructions back into
//! whatever markup its transport speaks.

use serde::{Deserialize, Serialize};

use intake_core::{Attribution, Prompt, UserId};

/// One inbound conversation event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// First contact or a repeated greeting, possibly carrying attribution
    /// tags and a referral slug from a deep link.
    StartConversation {
        /// The user the event belongs to.
        user_id: UserId,
        /// Public handle, if any.
        #[serde(default)]
        username: Option<String>,
        /// Display name, if any.
        #[serde(default)]
        first_name: Option<String>,
        /// Attribution tags, recorded only on first contact.
        #[serde(default)]
        attribution: Attribution,
        /// Referral link slug, if the greeting came through one.
        #[serde(default)]
        referral_slug: Option<String>,
    },

    /// Free-text input.
    SubmitAnswer {
        /// The user the event belongs to.
        user_id: UserId,
        /// The raw text.
        text: String,
    },

    /// A button pick, by option id.
    SelectOption {
        /// The user the event belongs to.
        user_id: UserId,
        /// The picked option id.
        option_id: String,
    },

    /// An explicit skip of the current question.
    Skip {
        /// The user the event belongs to.
        user_id: UserId,
    },

    /// A restart signal; discards any open session unconditionally.
    Cancel {
        /// The user the event belongs to.
        user_id: UserId,
    },
}

impl InboundEvent {
    /// The user this event belongs to.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::StartConversation { user_id, .. }
            | Self::SubmitAnswer { user_id, .. }
            | Self::SelectOption { user_id, .. }
            | Self::Skip { user_id }
            | Self::Cancel { user_id } => *user_id,
        }
    }
}

/// The instructions produced by one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    /// Prompts to render to the user, in order.
    pub prompts: Vec<Prompt>,
}
