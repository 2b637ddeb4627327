//! Promo code types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PromoCodeId;

/// A promotional code.
///
/// The code string is the user-facing, case-insensitive identity; it is
/// stored uppercase and may be edited by operators. Joins always go through
/// the internal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    /// Store-assigned identity.
    pub id: PromoCodeId,

    /// The code string, uppercase.
    pub code: String,

    /// Free-text description shown to the user on redemption.
    pub description: Option<String>,

    /// Whether this code may be attached to at most one submission
    /// system-wide.
    pub single_use: bool,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A promo code together with its redemption count, for operator listings.
#[derive(Debug, Clone, Serialize)]
pub struct PromoCodeWithUsage {
    /// The code.
    #[serde(flatten)]
    pub promo: PromoCode,

    /// Total redemption rows referencing this code, pending or attached.
    pub usage_count: i64,
}

/// Partial update applied to an existing promo code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromoCodeUpdate {
    /// New code string, normalized to uppercase on write.
    pub code: Option<String>,

    /// New description.
    pub description: Option<String>,

    /// New single-use flag.
    pub single_use: Option<bool>,
}

impl PromoCodeUpdate {
    /// True when the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.description.is_none() && self.single_use.is_none()
    }
}

/// A user's redemption not yet attached to any submission.
#[derive(Debug, Clone, Copy)]
pub struct PendingRedemption {
    /// The redeemed code.
    pub promo_code_id: PromoCodeId,

    /// Whether that code is single-use.
    pub single_use: bool,
}

/// Normalize a user-entered code to its canonical, case-insensitive form.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code("  summer "), "SUMMER");
        assert_eq!(normalize_code("Vip1"), "VIP1");
    }
}
