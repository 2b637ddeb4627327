//! Submission types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{SubmissionId, UserId};

/// One of the two fixed gender options offered by the intake flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Gender {
    /// Canonical string form, as stored and rendered.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            _ => Err(()),
        }
    }
}

/// The answers accumulated by one pass through the intake flow.
///
/// The first four fields are always filled by a completed flow; the two
/// free-text fields are null when the user skipped them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeAnswers {
    /// Gender option.
    pub gender: Option<Gender>,

    /// Age in years, validated to [1, 150].
    pub age: Option<i32>,

    /// Weight in kilograms, validated to [1, 500].
    pub weight: Option<f64>,

    /// Desired workouts per week, validated to [1, 7].
    pub workouts_per_week: Option<i32>,

    /// Free-text diet note, at most 500 characters.
    pub diet: Option<String>,

    /// Free-text health/injury note, at most 500 characters.
    pub health_note: Option<String>,
}

/// A completed intake submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Store-assigned identity.
    pub id: SubmissionId,

    /// The submitting user.
    pub user_id: UserId,

    /// The collected answers.
    pub answers: IntakeAnswers,

    /// Whether this submission has been reported to operators.
    ///
    /// Flipped from false to true exactly once.
    pub reported: bool,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A submission joined with the submitter's display attributes and every
/// promo code attached to it, as delivered to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionWithCodes {
    /// The submission itself.
    pub submission: Submission,

    /// Submitter's handle, if any.
    pub username: Option<String>,

    /// Submitter's display name, if any.
    pub first_name: Option<String>,

    /// Code strings of every attached promo redemption.
    pub promo_codes: Vec<String>,
}
