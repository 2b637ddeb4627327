//! User types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Display attributes supplied by the chat transport on first contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Public handle, if the user has one.
    pub username: Option<String>,

    /// Display name.
    pub first_name: Option<String>,
}

/// Marketing attribution tags carried on the first-contact deep link.
///
/// Recorded once at user creation and never updated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribution {
    /// Traffic source (e.g. a social network name).
    pub source: Option<String>,

    /// Traffic medium (e.g. "cpc").
    pub medium: Option<String>,

    /// Campaign label.
    pub campaign: Option<String>,
}

impl Attribution {
    /// True when no tag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.medium.is_none() && self.campaign.is_none()
    }
}

/// A registered end user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Transport-assigned identity.
    pub id: UserId,

    /// Public handle, if any.
    pub username: Option<String>,

    /// Display name, if any.
    pub first_name: Option<String>,

    /// Attribution tags fixed at creation.
    pub attribution: Attribution,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}
