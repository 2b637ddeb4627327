//! Core types and the intake state machine.
//!
//! This crate provides the foundational types used throughout the intake
//! platform:
//!
//! - **Identifiers**: `UserId`, `SubmissionId`, `PromoCodeId`, `LinkId`,
//!   `OperatorId`
//! - **Users**: `User`, `UserProfile`, `Attribution`
//! - **Submissions**: `Submission`, `IntakeAnswers`, `Gender`
//! - **Promo codes**: `PromoCode`, `PendingRedemption`
//! - **Referral links**: `ReferralLink`, `LinkWithStats`
//! - **Flow**: the pure conversational state machine (`FlowState`)
//!
//! # Identity
//!
//! User identities are assigned by the chat transport and are opaque
//! integers; every other entity carries a store-assigned serial id. All of
//! them are wrapped in newtypes so a submission id can never be passed where
//! a promo code id is expected.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod flow;
pub mod ids;
pub mod link;
pub mod promo;
pub mod submission;
pub mod user;

pub use flow::{FlowInput, FlowState, Prompt, PromptOption, Step};
pub use ids::{IdError, LinkId, OperatorId, PromoCodeId, SubmissionId, UserId};
pub use link::{is_valid_slug, LinkUpdate, LinkWithStats, ReferralLink};
pub use promo::{normalize_code, PendingRedemption, PromoCode, PromoCodeUpdate, PromoCodeWithUsage};
pub use submission::{Gender, IntakeAnswers, Submission, SubmissionWithCodes};
pub use user::{Attribution, User, UserProfile};
