//! Durable ledger for the intake service.
//!
//! This crate owns the lifecycle of every durable entity — users,
//! submissions, promo codes, promo redemptions, referral links and clicks —
//! behind the [`Ledger`] trait.
//!
//! Two implementations are provided:
//!
//! - [`PgLedger`]: PostgreSQL over a bounded sqlx pool, with embedded
//!   migrations. Every call is one logical transaction.
//! - [`MemLedger`]: in-memory, for tests. Mirrors the conflict semantics of
//!   the PostgreSQL schema exactly.
//!
//! # Conditional writes
//!
//! The promo-redemption invariants (one pending redemption per user and
//! code; a single-use code attached to at most one submission system-wide)
//! are carried by uniqueness constraints, not application locks. Writers
//! issue a conditional insert and read "lost the race" out of the affected
//! row count. Callers must treat a `false`/no-op result as the expected
//! concurrent outcome, never as a failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;

use intake_core::{
    Attribution, IntakeAnswers, LinkId, LinkUpdate, LinkWithStats, PendingRedemption, PromoCode,
    PromoCodeId, PromoCodeUpdate, PromoCodeWithUsage, ReferralLink, SubmissionId,
    SubmissionWithCodes, User, UserId, UserProfile,
};

/// The storage trait defining all ledger operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (PostgreSQL in production, in-memory for testing).
#[async_trait]
pub trait Ledger: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    /// Fetch a user, creating the record on first contact.
    ///
    /// Attribution tags are recorded only when the user is created; on an
    /// existing user they are ignored. Returns the user and whether it was
    /// created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_or_create_user(
        &self,
        id: UserId,
        profile: &UserProfile,
        attribution: &Attribution,
    ) -> Result<(User, bool)>;

    // =========================================================================
    // Submissions
    // =========================================================================

    /// Persist a completed intake submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_submission(
        &self,
        user_id: UserId,
        answers: &IntakeAnswers,
    ) -> Result<SubmissionId>;

    /// Fetch one submission joined with submitter attributes and attached
    /// promo codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn submission_with_codes(
        &self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionWithCodes>>;

    /// Fetch every submission not yet reported to operators.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn unreported_submissions(&self) -> Result<Vec<SubmissionWithCodes>>;

    /// Flip the reported flag for a batch of submissions in one update.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_submissions_reported(&self, ids: &[SubmissionId]) -> Result<()>;

    // =========================================================================
    // Promo redemption
    // =========================================================================

    /// Look up a promo code by its case-insensitive code string.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_promo_code(&self, code: &str) -> Result<Option<PromoCode>>;

    /// Whether the user already holds a pending redemption of this code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn has_pending_redemption(&self, user_id: UserId, promo_id: PromoCodeId)
        -> Result<bool>;

    /// Record a pending redemption. A concurrent identical redemption is
    /// absorbed; the call is idempotent per (user, code).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_pending_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
    ) -> Result<()>;

    /// Every pending redemption held by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn pending_redemptions(&self, user_id: UserId) -> Result<Vec<PendingRedemption>>;

    /// Whether any redemption of this code exists at all, pending or
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn has_any_redemption(&self, promo_id: PromoCodeId) -> Result<bool>;

    /// Whether any redemption of this code is attached to a submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn has_attached_redemption(&self, promo_id: PromoCodeId) -> Result<bool>;

    /// Conditionally attach a redemption to a submission.
    ///
    /// Returns `false` when a uniqueness constraint rejected the write —
    /// either the single-use code was claimed by another submission in the
    /// meantime, or this (user, code, submission) row already exists. That
    /// outcome is the expected lost-race signal, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_attached_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
        submission_id: SubmissionId,
    ) -> Result<bool>;

    // =========================================================================
    // Promo administration
    // =========================================================================

    /// Create a promo code. The code string is stored uppercase.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` on a duplicate code string.
    async fn create_promo_code(
        &self,
        code: &str,
        description: Option<&str>,
        single_use: bool,
    ) -> Result<PromoCodeId>;

    /// List every promo code with its redemption count, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_promo_codes(&self) -> Result<Vec<PromoCodeWithUsage>>;

    /// Apply a partial update to a promo code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id and
    /// `StoreError::Conflict` on a duplicate code string.
    async fn update_promo_code(&self, id: PromoCodeId, update: &PromoCodeUpdate) -> Result<()>;

    /// Delete a promo code and its redemptions.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn delete_promo_code(&self, id: PromoCodeId) -> Result<()>;

    // =========================================================================
    // Referral links
    // =========================================================================

    /// Create a referral link. The slug is stored lowercase.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` on a duplicate slug.
    async fn create_link(&self, slug: &str, description: Option<&str>) -> Result<LinkId>;

    /// List every link with total and 30-day click aggregates, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_links(&self) -> Result<Vec<LinkWithStats>>;

    /// Look up a link by its case-insensitive slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_link_by_slug(&self, slug: &str) -> Result<Option<ReferralLink>>;

    /// Record a click on the link with this slug, if it exists.
    ///
    /// Returns the clicked link, or `None` for an unknown slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn record_click(&self, slug: &str, user_id: UserId) -> Result<Option<ReferralLink>>;

    /// Apply a partial update to a link.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id and
    /// `StoreError::Conflict` on a duplicate slug.
    async fn update_link(&self, id: LinkId, update: &LinkUpdate) -> Result<()>;

    /// Delete a link and its recorded clicks.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    async fn delete_link(&self, id: LinkId) -> Result<()>;
}
