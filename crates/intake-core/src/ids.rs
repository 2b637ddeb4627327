//! Identifier types for the intake platform.
//!
//! This module provides strongly-typed identifiers for users, submissions,
//! promo codes, referral links, and operators.
//!
//! # Macro-based ID Types
//!
//! The `int_id_type!` macro reduces boilerplate for integer-based identifier
//! types, ensuring consistent implementation of serialization, parsing, and
//! display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for identifier parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The value was not a valid integer identifier.
    #[error("invalid integer identifier")]
    InvalidInteger,
}

/// Macro to define an integer-based identifier type with standard trait
/// implementations.
///
/// This macro generates a newtype wrapper around `i64` with implementations
/// for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (transparent, as a bare integer)
/// - `FromStr`, `Display`, `Debug`
/// - `From<i64>`, `From<$name> for i64`
macro_rules! int_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create an identifier from a raw integer.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Return the underlying integer.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse().map_err(|_| IdError::InvalidInteger)?;
                Ok(Self(value))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

int_id_type!(
    UserId,
    "A user identifier.\n\nUser ids are assigned by the chat transport and treated as opaque."
);
int_id_type!(SubmissionId, "A completed intake submission identifier.");
int_id_type!(
    PromoCodeId,
    "A promo code identifier.\n\nThe internal id is the join identity; the code string may be edited by operators."
);
int_id_type!(LinkId, "A referral link identifier.");
int_id_type!(
    OperatorId,
    "An operator identity, addressable through the chat transport like any user."
);
