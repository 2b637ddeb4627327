//! PostgreSQL ledger implementation.
//!
//! Every method runs as a single statement (or a short statement pair whose
//! intermediate states are not observable), so a failed call leaves nothing
//! half-written. The redemption invariants live in partial unique indexes;
//! conditional inserts use `ON CONFLICT DO NOTHING` and read the outcome
//! from the affected row count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use intake_core::{
    Attribution, Gender, IntakeAnswers, LinkId, LinkUpdate, LinkWithStats, PendingRedemption,
    PromoCode, PromoCodeId, PromoCodeUpdate, PromoCodeWithUsage, ReferralLink, Submission,
    SubmissionId, SubmissionWithCodes, User, UserId, UserProfile,
};

use crate::error::{Result, StoreError};
use crate::Ledger;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// PostgreSQL-backed ledger over a bounded connection pool.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Connect to the database, sizing the pool, and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached or a migration
    /// fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are assumed to have run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.user_id),
            username: row.username,
            first_name: row.first_name,
            attribution: Attribution {
                source: row.utm_source,
                medium: row.utm_medium,
                campaign: row.utm_campaign,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PromoCodeRow {
    id: i64,
    code: String,
    description: Option<String>,
    single_use: bool,
    created_at: DateTime<Utc>,
}

impl From<PromoCodeRow> for PromoCode {
    fn from(row: PromoCodeRow) -> Self {
        Self {
            id: PromoCodeId::new(row.id),
            code: row.code,
            description: row.description,
            single_use: row.single_use,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PromoCodeUsageRow {
    id: i64,
    code: String,
    description: Option<String>,
    single_use: bool,
    created_at: DateTime<Utc>,
    usage_count: i64,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LinkRow> for ReferralLink {
    fn from(row: LinkRow) -> Self {
        Self {
            id: LinkId::new(row.id),
            slug: row.slug,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkStatsRow {
    id: i64,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    total_clicks: i64,
    month_clicks: i64,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    user_id: i64,
    gender: Option<String>,
    age: Option<i32>,
    weight: Option<f64>,
    workouts_per_week: Option<i32>,
    diet: Option<String>,
    health_note: Option<String>,
    reported: bool,
    created_at: DateTime<Utc>,
    username: Option<String>,
    first_name: Option<String>,
    promo_codes: Vec<String>,
}

impl From<ReportRow> for SubmissionWithCodes {
    fn from(row: ReportRow) -> Self {
        Self {
            submission: Submission {
                id: SubmissionId::new(row.id),
                user_id: UserId::new(row.user_id),
                answers: IntakeAnswers {
                    gender: row.gender.as_deref().and_then(|g| g.parse::<Gender>().ok()),
                    age: row.age,
                    weight: row.weight,
                    workouts_per_week: row.workouts_per_week,
                    diet: row.diet,
                    health_note: row.health_note,
                },
                reported: row.reported,
                created_at: row.created_at,
            },
            username: row.username,
            first_name: row.first_name,
            promo_codes: row.promo_codes,
        }
    }
}

/// Shared SELECT for submissions joined with submitter and attached codes.
const REPORT_SELECT: &str = "\
    SELECT s.id, s.user_id, s.gender, s.age, s.weight, s.workouts_per_week,
           s.diet, s.health_note, s.reported, s.created_at,
           u.username, u.first_name,
           array_remove(array_agg(pc.code ORDER BY pc.code), NULL) AS promo_codes
    FROM submissions s
    JOIN users u ON u.user_id = s.user_id
    LEFT JOIN promo_redemptions pr
           ON pr.submission_id = s.id
    LEFT JOIN promo_codes pc ON pc.id = pr.promo_code_id";

#[async_trait]
impl Ledger for PgLedger {
    async fn get_or_create_user(
        &self,
        id: UserId,
        profile: &UserProfile,
        attribution: &Attribution,
    ) -> Result<(User, bool)> {
        let created = sqlx::query(
            "INSERT INTO users (user_id, username, first_name,
                                utm_source, utm_medium, utm_campaign)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(id.get())
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&attribution.source)
        .bind(&attribution.medium)
        .bind(&attribution.campaign)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        let row: UserRow = sqlx::query_as(
            "SELECT user_id, username, first_name,
                    utm_source, utm_medium, utm_campaign, created_at
             FROM users WHERE user_id = $1",
        )
        .bind(id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok((row.into(), created))
    }

    async fn create_submission(
        &self,
        user_id: UserId,
        answers: &IntakeAnswers,
    ) -> Result<SubmissionId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO submissions
                 (user_id, gender, age, weight, workouts_per_week, diet, health_note)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(user_id.get())
        .bind(answers.gender.map(Gender::as_str))
        .bind(answers.age)
        .bind(answers.weight)
        .bind(answers.workouts_per_week)
        .bind(&answers.diet)
        .bind(&answers.health_note)
        .fetch_one(&self.pool)
        .await?;

        Ok(SubmissionId::new(id))
    }

    async fn submission_with_codes(
        &self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionWithCodes>> {
        let query = format!(
            "{REPORT_SELECT}
             WHERE s.id = $1
             GROUP BY s.id, u.username, u.first_name"
        );
        let row: Option<ReportRow> = sqlx::query_as(&query)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn unreported_submissions(&self) -> Result<Vec<SubmissionWithCodes>> {
        let query = format!(
            "{REPORT_SELECT}
             WHERE NOT s.reported
             GROUP BY s.id, u.username, u.first_name
             ORDER BY s.created_at DESC"
        );
        let rows: Vec<ReportRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_submissions_reported(&self, ids: &[SubmissionId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        sqlx::query("UPDATE submissions SET reported = TRUE WHERE id = ANY($1)")
            .bind(raw)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_promo_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let row: Option<PromoCodeRow> = sqlx::query_as(
            "SELECT id, code, description, single_use, created_at
             FROM promo_codes
             WHERE UPPER(code) = UPPER($1)",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn has_pending_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM promo_redemptions
                 WHERE user_id = $1 AND promo_code_id = $2 AND submission_id IS NULL
             )",
        )
        .bind(user_id.get())
        .bind(promo_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_pending_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
    ) -> Result<()> {
        // A concurrent identical redemption hits the pending-once index;
        // DO NOTHING makes the call idempotent.
        sqlx::query(
            "INSERT INTO promo_redemptions (user_id, promo_code_id, submission_id)
             VALUES ($1, $2, NULL)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.get())
        .bind(promo_id.get())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_redemptions(&self, user_id: UserId) -> Result<Vec<PendingRedemption>> {
        let rows: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT pr.promo_code_id, pc.single_use
             FROM promo_redemptions pr
             JOIN promo_codes pc ON pc.id = pr.promo_code_id
             WHERE pr.user_id = $1 AND pr.submission_id IS NULL
             ORDER BY pr.redeemed_at",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(promo_code_id, single_use)| PendingRedemption {
                promo_code_id: PromoCodeId::new(promo_code_id),
                single_use,
            })
            .collect())
    }

    async fn has_any_redemption(&self, promo_id: PromoCodeId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM promo_redemptions WHERE promo_code_id = $1
             )",
        )
        .bind(promo_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn has_attached_redemption(&self, promo_id: PromoCodeId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM promo_redemptions
                 WHERE promo_code_id = $1 AND submission_id IS NOT NULL
             )",
        )
        .bind(promo_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_attached_redemption(
        &self,
        user_id: UserId,
        promo_id: PromoCodeId,
        submission_id: SubmissionId,
    ) -> Result<bool> {
        // The single-use flag is copied from the code inside the statement,
        // so the single-use-once index can reject a second attach of the
        // same code atomically. An affected count of zero means the write
        // lost a race (or already happened) and is reported as `false`.
        let attached = sqlx::query(
            "INSERT INTO promo_redemptions
                 (user_id, promo_code_id, submission_id, single_use)
             SELECT $1, pc.id, $3, pc.single_use
             FROM promo_codes pc
             WHERE pc.id = $2
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.get())
        .bind(promo_id.get())
        .bind(submission_id.get())
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        Ok(attached)
    }

    async fn create_promo_code(
        &self,
        code: &str,
        description: Option<&str>,
        single_use: bool,
    ) -> Result<PromoCodeId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO promo_codes (code, description, single_use)
             VALUES (UPPER($1), $2, $3)
             RETURNING id",
        )
        .bind(code)
        .bind(description)
        .bind(single_use)
        .fetch_one(&self.pool)
        .await?;

        Ok(PromoCodeId::new(id))
    }

    async fn list_promo_codes(&self) -> Result<Vec<PromoCodeWithUsage>> {
        let rows: Vec<PromoCodeUsageRow> = sqlx::query_as(
            "SELECT pc.id, pc.code, pc.description, pc.single_use, pc.created_at,
                    COUNT(pr.id) AS usage_count
             FROM promo_codes pc
             LEFT JOIN promo_redemptions pr ON pr.promo_code_id = pc.id
             GROUP BY pc.id
             ORDER BY pc.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PromoCodeWithUsage {
                promo: PromoCode {
                    id: PromoCodeId::new(row.id),
                    code: row.code,
                    description: row.description,
                    single_use: row.single_use,
                    created_at: row.created_at,
                },
                usage_count: row.usage_count,
            })
            .collect())
    }

    async fn update_promo_code(&self, id: PromoCodeId, update: &PromoCodeUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let updated = sqlx::query(
            "UPDATE promo_codes SET
                 code = COALESCE(UPPER($2), code),
                 description = COALESCE($3, description),
                 single_use = COALESCE($4, single_use)
             WHERE id = $1",
        )
        .bind(id.get())
        .bind(&update.code)
        .bind(&update.description)
        .bind(update.single_use)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "promo code",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn delete_promo_code(&self, id: PromoCodeId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM promo_codes WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotFound {
                entity: "promo code",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn create_link(&self, slug: &str, description: Option<&str>) -> Result<LinkId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO referral_links (slug, description)
             VALUES (LOWER($1), $2)
             RETURNING id",
        )
        .bind(slug)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(LinkId::new(id))
    }

    async fn list_links(&self) -> Result<Vec<LinkWithStats>> {
        let rows: Vec<LinkStatsRow> = sqlx::query_as(
            "SELECT rl.id, rl.slug, rl.description, rl.created_at,
                    COUNT(rc.id) AS total_clicks,
                    COUNT(rc.id) FILTER (
                        WHERE rc.created_at >= now() - INTERVAL '30 days'
                    ) AS month_clicks
             FROM referral_links rl
             LEFT JOIN referral_clicks rc ON rc.link_id = rl.id
             GROUP BY rl.id
             ORDER BY rl.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LinkWithStats {
                link: ReferralLink {
                    id: LinkId::new(row.id),
                    slug: row.slug,
                    description: row.description,
                    created_at: row.created_at,
                },
                total_clicks: row.total_clicks,
                month_clicks: row.month_clicks,
            })
            .collect())
    }

    async fn find_link_by_slug(&self, slug: &str) -> Result<Option<ReferralLink>> {
        let row: Option<LinkRow> = sqlx::query_as(
            "SELECT id, slug, description, created_at
             FROM referral_links
             WHERE slug = LOWER($1)",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn record_click(&self, slug: &str, user_id: UserId) -> Result<Option<ReferralLink>> {
        let Some(link) = self.find_link_by_slug(slug).await? else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO referral_clicks (link_id, user_id) VALUES ($1, $2)")
            .bind(link.id.get())
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;

        Ok(Some(link))
    }

    async fn update_link(&self, id: LinkId, update: &LinkUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let updated = sqlx::query(
            "UPDATE referral_links SET
                 slug = COALESCE(LOWER($2), slug),
                 description = COALESCE($3, description)
             WHERE id = $1",
        )
        .bind(id.get())
        .bind(&update.slug)
        .bind(&update.description)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "referral link",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn delete_link(&self, id: LinkId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM referral_links WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotFound {
                entity: "referral link",
                id: id.get(),
            });
        }
        Ok(())
    }
}
