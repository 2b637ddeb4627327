//! In-memory ledger implementation.
//!
//! Used by the integration tests in place of PostgreSQL. The conflict
//! semantics mirror the partial unique indexes of the real schema: a
//! conditional write that would violate one reports `false` (or is a no-op)
//! instead of erroring, exactly like its `ON CONFLICT DO NOTHING`
//! counterpart.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use intake_core::{
    Attribution, IntakeAnswers, LinkId, LinkUpdate, LinkWithStats, PendingRedemption, PromoCode,
    PromoCodeId, PromoCodeUpdate, PromoCodeWithUsage, ReferralLink, Submission, SubmissionId,
    SubmissionWithCodes, User, UserId, UserProfile,
};

use crate::error::{Result, StoreError};
use crate::Ledger;

#[derive(Debug, Clone)]
struct SubmissionRecord {
    id: i64,
    user_id: i64,
    answers: IntakeAnswers,
    reported: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PromoRecord {
    id: i64,
    code: String,
    description: Option<String>,
    single_use: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RedemptionRecord {
    user_id: i64,
    promo_code_id: i64,
    submission_id: Option<i64>,
    /// Attach-time copy of the code's flag; meaningless while pending.
    single_use: bool,
}

#[derive(Debug, Clone)]
struct LinkRecord {
    id: i64,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ClickRecord {
    link_id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    submissions: BTreeMap<i64, SubmissionRecord>,
    promo_codes: BTreeMap<i64, PromoRecord>,
    redemptions: Vec<RedemptionRecord>,
    links: BTreeMap<i64, LinkRecord>,
    clicks: Vec<ClickRecord>,
    next_submission_id: i64,
    next_promo_id: i64,
    next_link_id: i64,
}

/// In-memory ledger for tests.
#[derive(Debug, Clone, Default)]
pub struct MemLedger {
    inner: Arc<Mutex<Inner>>,
}

impl MemLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("ledger lock poisoned")
    }
}

impl Inner {
    fn report_for(&self, record: &SubmissionRecord) -> SubmissionWithCodes {
        let user = self.users.get(&record.user_id);
        let mut promo_codes: Vec<String> = self
            .redemptions
            .iter()
            .filter(|r| r.submission_id == Some(record.id))
            .filter_map(|r| self.promo_codes.get(&r.promo_code_id))
            .map(|p| p.code.clone())
            .collect();
        promo_codes.sort();

        SubmissionWithCodes {
            submission: Submission {
                id: SubmissionId::new(record.id),
                user_id: UserId::new(record.user_id),
                answers: record.answers.clone(),
                reported: record.reported,
                created_at: record.created_at,
            },
            username: user.and_then(|u| u.username.clone()),
            first_name: user.and_then(|u| u.first_name.clone()),
            promo_codes,
        }
    }

    fn promo_code_exists(&self, code: &str, except: Option<i64>) -> bool {
        self.promo_codes
            .values()
            .any(|p| p.code == code && Some(p.id) != except)
    }

    fn slug_exists(&self, slug: &str, except: Option<i64>) -> bool {
        self.links
            .values()
            .any(|l| l.slug == slug && Some(l.id) != except)
    }
}

#[async_trait]
impl Ledger for MemLedger {
    async fn get_or_create_user(
        &self,
        id: UserId,
        profile: &UserProfile,
        attribution: &Attribution,
    ) -> Result<(User, bool)> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.get(&id.get()) {
            return Ok((user.clone(), false));
        }
        let user = User {
            id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            attribution: attribution.clone(),
            created_at: Utc::now(),
        };
        inner.users.insert(id.get(), user.clone());
        Ok((user, true))
    }

    async fn create_submission(
        &self,
        user_id: UserId,
        answers: &IntakeAnswers,
    ) -> Result<SubmissionId> {
        let mut inner = self.lock();
        inner.next_submission_id += 1;
        let id = inner.next_submission_id;
        inner.submissions.insert(
            id,
            SubmissionRecord {
                id,
                user_id: user_id.get(),
                answers: answers.clone(),
                reported: false,
                created_at: Utc::now(),
            },
        );
        Ok(SubmissionId::new(id))
    }

    async fn submission_with_codes(
        &self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionWithCodes>> {
        let inner = self.lock();
        Ok(inner
            .submissions
            .get(&id.get())
            .map(|record| inner.report_for(record)))
    }

    async fn unreported_submissions(&self) -> Result<Vec<SubmissionWithCodes>> {
        let inner = self.lock();
        Ok(inner
            .submissions
            .values()
            .rev()
            .filter(|record| !record.reported)
            .map(|record| inner.report_for(record))
            .collect())
    }

    async fn mark_submissions_reported(&self, ids: &[SubmissionId]) -> Result<()> {
        let mut inner = self.lock();
        for id in ids {
            if let Some(record) = inner.submissions.get_mut(&id.get()) {
                record.reported = true;
            }
        }
        Ok(())
    }

    async fn find_promo_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let inner = self.lock();
        Ok(inner
            .promo_codes
            .values()
            .find(|p| p.code.eq_ignore_ascii_case(code.trim()))
            .map(|p| PromoCode {
                id: PromoCodeId::new(p.id),
                code: p.code.clone(),
                description: p.description.clone(),
                single_use: p.single_use,
                created_at: p.created_at,
            }))
    }

    async fn has_pending_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
    ) -> Result<bool> {
        let inner = self.lock();
        Ok(inner.redemptions.iter().any(|r| {
            r.user_id == user_id.get()
                && r.promo_code_id == promo_id.get()
                && r.submission_id.is_none()
        }))
    }

    async fn insert_pending_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
    ) -> Result<()> {
        let mut inner = self.lock();
        let exists = inner.redemptions.iter().any(|r| {
            r.user_id == user_id.get()
                && r.promo_code_id == promo_id.get()
                && r.submission_id.is_none()
        });
        if !exists {
            inner.redemptions.push(RedemptionRecord {
                user_id: user_id.get(),
                promo_code_id: promo_id.get(),
                submission_id: None,
                single_use: false,
            });
        }
        Ok(())
    }

    async fn pending_redemptions(&self, user_id: UserId) -> Result<Vec<PendingRedemption>> {
        let inner = self.lock();
        Ok(inner
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id.get() && r.submission_id.is_none())
            .filter_map(|r| {
                inner
                    .promo_codes
                    .get(&r.promo_code_id)
                    .map(|p| PendingRedemption {
                        promo_code_id: PromoCodeId::new(p.id),
                        single_use: p.single_use,
                    })
            })
            .collect())
    }

    async fn has_any_redemption(&self, promo_id: PromoCodeId) -> Result<bool> {
        let inner = self.lock();
        Ok(inner
            .redemptions
            .iter()
            .any(|r| r.promo_code_id == promo_id.get()))
    }

    async fn has_attached_redemption(&self, promo_id: PromoCodeId) -> Result<bool> {
        let inner = self.lock();
        Ok(inner
            .redemptions
            .iter()
            .any(|r| r.promo_code_id == promo_id.get() && r.submission_id.is_some()))
    }

    async fn insert_attached_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
        submission_id: SubmissionId,
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(promo) = inner.promo_codes.get(&promo_id.get()) else {
            return Ok(false);
        };
        let single_use = promo.single_use;

        // Mirror of promo_redemptions_single_use_once.
        if single_use
            && inner
                .redemptions
                .iter()
                .any(|r| r.promo_code_id == promo_id.get() && r.submission_id.is_some())
        {
            return Ok(false);
        }

        // Mirror of promo_redemptions_attached_once.
        if inner.redemptions.iter().any(|r| {
            r.user_id == user_id.get()
                && r.promo_code_id == promo_id.get()
                && r.submission_id == Some(submission_id.get())
        }) {
            return Ok(false);
        }

        inner.redemptions.push(RedemptionRecord {
            user_id: user_id.get(),
            promo_code_id: promo_id.get(),
            submission_id: Some(submission_id.get()),
            single_use,
        });
        Ok(true)
    }

    async fn create_promo_code(
        &self,
        code: &str,
        description: Option<&str>,
        single_use: bool,
    ) -> Result<PromoCodeId> {
        let mut inner = self.lock();
        let code = code.to_uppercase();
        if inner.promo_code_exists(&code, None) {
            return Err(StoreError::Conflict(format!("duplicate code: {code}")));
        }
        inner.next_promo_id += 1;
        let id = inner.next_promo_id;
        inner.promo_codes.insert(
            id,
            PromoRecord {
                id,
                code,
                description: description.map(ToString::to_string),
                single_use,
                created_at: Utc::now(),
            },
        );
        Ok(PromoCodeId::new(id))
    }

    async fn list_promo_codes(&self) -> Result<Vec<PromoCodeWithUsage>> {
        let inner = self.lock();
        Ok(inner
            .promo_codes
            .values()
            .rev()
            .map(|p| PromoCodeWithUsage {
                promo: PromoCode {
                    id: PromoCodeId::new(p.id),
                    code: p.code.clone(),
                    description: p.description.clone(),
                    single_use: p.single_use,
                    created_at: p.created_at,
                },
                usage_count: inner
                    .redemptions
                    .iter()
                    .filter(|r| r.promo_code_id == p.id)
                    .count() as i64,
            })
            .collect())
    }

    async fn update_promo_code(&self, id: PromoCodeId, update: &PromoCodeUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut inner = self.lock();
        if let Some(code) = &update.code {
            let code = code.to_uppercase();
            if inner.promo_code_exists(&code, Some(id.get())) {
                return Err(StoreError::Conflict(format!("duplicate code: {code}")));
            }
        }
        let Some(record) = inner.promo_codes.get_mut(&id.get()) else {
            return Err(StoreError::NotFound {
                entity: "promo code",
                id: id.get(),
            });
        };
        if let Some(code) = &update.code {
            record.code = code.to_uppercase();
        }
        if let Some(description) = &update.description {
            record.description = Some(description.clone());
        }
        if let Some(single_use) = update.single_use {
            record.single_use = single_use;
        }
        Ok(())
    }

    async fn delete_promo_code(&self, id: PromoCodeId) -> Result<()> {
        let mut inner = self.lock();
        if inner.promo_codes.remove(&id.get()).is_none() {
            return Err(StoreError::NotFound {
                entity: "promo code",
                id: id.get(),
            });
        }
        inner.redemptions.retain(|r| r.promo_code_id != id.get());
        Ok(())
    }

    async fn create_link(&self, slug: &str, description: Option<&str>) -> Result<LinkId> {
        let mut inner = self.lock();
        let slug = slug.to_lowercase();
        if inner.slug_exists(&slug, None) {
            return Err(StoreError::Conflict(format!("duplicate slug: {slug}")));
        }
        inner.next_link_id += 1;
        let id = inner.next_link_id;
        inner.links.insert(
            id,
            LinkRecord {
                id,
                slug,
                description: description.map(ToString::to_string),
                created_at: Utc::now(),
            },
        );
        Ok(LinkId::new(id))
    }

    async fn list_links(&self) -> Result<Vec<LinkWithStats>> {
        let inner = self.lock();
        let month_ago = Utc::now() - Duration::days(30);
        Ok(inner
            .links
            .values()
            .rev()
            .map(|l| {
                let clicks: Vec<&ClickRecord> = inner
                    .clicks
                    .iter()
                    .filter(|c| c.link_id == l.id)
                    .collect();
                LinkWithStats {
                    link: ReferralLink {
                        id: LinkId::new(l.id),
                        slug: l.slug.clone(),
                        description: l.description.clone(),
                        created_at: l.created_at,
                    },
                    total_clicks: clicks.len() as i64,
                    month_clicks: clicks
                        .iter()
                        .filter(|c| c.created_at >= month_ago)
                        .count() as i64,
                }
            })
            .collect())
    }

    async fn find_link_by_slug(&self, slug: &str) -> Result<Option<ReferralLink>> {
        let inner = self.lock();
        let slug = slug.to_lowercase();
        Ok(inner.links.values().find(|l| l.slug == slug).map(|l| {
            ReferralLink {
                id: LinkId::new(l.id),
                slug: l.slug.clone(),
                description: l.description.clone(),
                created_at: l.created_at,
            }
        }))
    }

    async fn record_click(&self, slug: &str, user_id: UserId) -> Result<Option<ReferralLink>> {
        let Some(link) = self.find_link_by_slug(slug).await? else {
            return Ok(None);
        };
        let mut inner = self.lock();
        inner.clicks.push(ClickRecord {
            link_id: link.id.get(),
            user_id: user_id.get(),
            created_at: Utc::now(),
        });
        Ok(Some(link))
    }

    async fn update_link(&self, id: LinkId, update: &LinkUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut inner = self.lock();
        if let Some(slug) = &update.slug {
            let slug = slug.to_lowercase();
            if inner.slug_exists(&slug, Some(id.get())) {
                return Err(StoreError::Conflict(format!("duplicate slug: {slug}")));
            }
        }
        let Some(record) = inner.links.get_mut(&id.get()) else {
            return Err(StoreError::NotFound {
                entity: "referral link",
                id: id.get(),
            });
        };
        if let Some(slug) = &update.slug {
            record.slug = slug.to_lowercase();
        }
        if let Some(description) = &update.description {
            record.description = Some(description.clone());
        }
        Ok(())
    }

    async fn delete_link(&self, id: LinkId) -> Result<()> {
        let mut inner = self.lock();
        if inner.links.remove(&id.get()).is_none() {
            return Err(StoreError::NotFound {
                entity: "referral link",
                id: id.get(),
            });
        }
        inner.clicks.retain(|c| c.link_id != id.get());
        Ok(())
    }
}
