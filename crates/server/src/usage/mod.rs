//! Daily usage ledger
//!
//! One row per (user, UTC calendar day) counting successful completions.
//! Rows are created lazily by the first increment of the day and never
//! deleted. Checking does not write.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::core::auth::User;
use crate::core::db::format_date;
use crate::core::error::{Error, Result};

pub const FREE_DAILY_LIMIT: i64 = 5;
pub const PREMIUM_DAILY_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn of(user: &User, now: DateTime<Utc>) -> Self {
        if user.has_active_premium(now) {
            Tier::Premium
        } else {
            Tier::Free
        }
    }

    pub fn daily_limit(self) -> i64 {
        match self {
            Tier::Free => FREE_DAILY_LIMIT,
            Tier::Premium => PREMIUM_DAILY_LIMIT,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Free => f.write_str("Free"),
            Tier::Premium => f.write_str("Premium"),
        }
    }
}

/// Daily limit the user is entitled to at `now`
pub fn effective_limit(user: &User, now: DateTime<Utc>) -> i64 {
    Tier::of(user, now).daily_limit()
}

/// Admission decision for a given count against a tier
pub fn admit(count: i64, tier: Tier) -> Result<i64> {
    let limit = tier.daily_limit();
    if count >= limit {
        Err(Error::QuotaExceeded { limit, tier })
    } else {
        Ok(limit - count)
    }
}

/// Snapshot reported by `/status`
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub today: i64,
    pub remaining: i64,
    pub limit: i64,
}

pub struct UsageLedger {
    pool: SqlitePool,
}

impl UsageLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Allow or reject a chat attempt, returning how many remain today
    pub async fn check(&self, user: &User) -> Result<i64> {
        self.check_at(user, Utc::now()).await
    }

    pub async fn check_at(&self, user: &User, now: DateTime<Utc>) -> Result<i64> {
        let count = self.count_on(user.id, now.date_naive()).await?;
        admit(count, Tier::of(user, now))
    }

    pub async fn count_today(&self, user_id: i64) -> Result<i64> {
        self.count_on(user_id, Utc::now().date_naive()).await
    }

    pub async fn count_on(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT count FROM usage WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(format_date(date))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(count,)| count).unwrap_or(0))
    }

    pub async fn summary(&self, user: &User) -> Result<UsageSummary> {
        let now = Utc::now();
        let today = self.count_on(user.id, now.date_naive()).await?;
        let limit = effective_limit(user, now);
        Ok(UsageSummary {
            today,
            remaining: (limit - today).max(0),
            limit,
        })
    }
}

/// Count one successful completion for `user_id` on `date`.
///
/// Takes any executor so the caller can run it in the same transaction that
/// persists the conversation turn.
pub async fn increment<'e, E>(executor: E, user_id: i64, date: NaiveDate) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO usage (user_id, date, count) VALUES (?, ?, 1)
        ON CONFLICT (user_id, date) DO UPDATE SET count = count + 1
        "#,
    )
    .bind(user_id)
    .bind(format_date(date))
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AuthManager;
    use crate::core::db;

    fn user(is_premium: bool, premium_until: Option<DateTime<Utc>>) -> User {
        User {
            id: 1,
            email: "a@b.com".into(),
            password_hash: String::new(),
            is_premium,
            premium_until,
            stripe_customer_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn limit_is_ten_only_for_active_premium() {
        let now = Utc::now();
        let later = Some(now + chrono::Duration::days(3));
        let earlier = Some(now - chrono::Duration::days(3));

        assert_eq!(effective_limit(&user(true, later), now), 10);
        assert_eq!(effective_limit(&user(true, earlier), now), 5);
        assert_eq!(effective_limit(&user(true, None), now), 5);
        assert_eq!(effective_limit(&user(false, later), now), 5);
        assert_eq!(effective_limit(&user(false, None), now), 5);
    }

    #[test]
    fn admit_rejects_exactly_at_or_above_limit() {
        for count in 0..FREE_DAILY_LIMIT {
            assert_eq!(admit(count, Tier::Free).unwrap(), FREE_DAILY_LIMIT - count);
        }
        for count in FREE_DAILY_LIMIT..FREE_DAILY_LIMIT + 3 {
            match admit(count, Tier::Free) {
                Err(Error::QuotaExceeded { limit, tier }) => {
                    assert_eq!(limit, 5);
                    assert_eq!(tier, Tier::Free);
                }
                other => panic!("expected quota error, got {:?}", other),
            }
        }
        assert!(admit(9, Tier::Premium).is_ok());
        assert!(admit(10, Tier::Premium).is_err());
    }

    #[tokio::test]
    async fn increments_accumulate_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("usage.db").display());
        let pool = db::connect(&url).await.unwrap();
        let auth = AuthManager::new(pool.clone(), "s", chrono::Duration::days(1));
        let (user, _) = auth.register("a@b.com", "x").await.unwrap();
        let ledger = UsageLedger::new(pool.clone());

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();

        assert_eq!(ledger.count_on(user.id, today).await.unwrap(), 0);
        for _ in 0..3 {
            increment(&pool, user.id, today).await.unwrap();
        }
        increment(&pool, user.id, yesterday).await.unwrap();

        assert_eq!(ledger.count_on(user.id, today).await.unwrap(), 3);
        assert_eq!(ledger.count_on(user.id, yesterday).await.unwrap(), 1);

        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows.0, 2);
    }

    #[tokio::test]
    async fn check_does_not_materialize_rows() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("usage.db").display());
        let pool = db::connect(&url).await.unwrap();
        let auth = AuthManager::new(pool.clone(), "s", chrono::Duration::days(1));
        let (user, _) = auth.register("a@b.com", "x").await.unwrap();
        let ledger = UsageLedger::new(pool.clone());

        assert_eq!(ledger.check(&user).await.unwrap(), 5);

        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows.0, 0);
    }
}
