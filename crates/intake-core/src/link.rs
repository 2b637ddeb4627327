//! Referral link types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LinkId;

/// A shareable referral link, identified by a unique slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralLink {
    /// Store-assigned identity.
    pub id: LinkId,

    /// Unique slug, lowercase.
    pub slug: String,

    /// Free-text description for operators.
    pub description: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A referral link with its click aggregates, for operator listings.
#[derive(Debug, Clone, Serialize)]
pub struct LinkWithStats {
    /// The link.
    #[serde(flatten)]
    pub link: ReferralLink,

    /// Clicks recorded over the link's lifetime.
    pub total_clicks: i64,

    /// Clicks recorded in the last 30 days.
    pub month_clicks: i64,
}

/// Partial update applied to an existing referral link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkUpdate {
    /// New slug, normalized to lowercase on write.
    pub slug: Option<String>,

    /// New description.
    pub description: Option<String>,
}

impl LinkUpdate {
    /// True when the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slug.is_none() && self.description.is_none()
    }
}

/// Validate a slug: ASCII letters, digits, `-` and `_` only, non-empty.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_slugs() {
        assert!(is_valid_slug("youtube2025"));
        assert!(is_valid_slug("spring_promo-1"));
    }

    #[test]
    fn rejects_empty_and_punctuated_slugs() {
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("has space"));
        assert!(!is_valid_slug("percent%"));
        assert!(!is_valid_slug("ünicode"));
    }
}
