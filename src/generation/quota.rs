use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::crud::DB;

/// Monthly allowance per requester, counted from successful audit rows.
///
/// The check and the later log write are not one transaction, so two
/// requests racing at "1 remaining" can both pass. Treat the limit as soft.
#[derive(Clone)]
pub struct QuotaGuard {
    db: DB,
}

impl QuotaGuard {
    pub fn new(db: DB) -> Self {
        Self { db }
    }

    pub async fn remaining(&self, requester_id: i64) -> Result<i64> {
        self.remaining_at(requester_id, Utc::now()).await
    }

    pub async fn allowed(&self, requester_id: i64) -> Result<bool> {
        Ok(self.remaining(requester_id).await? > 0)
    }

    pub async fn remaining_at(&self, requester_id: i64, now: DateTime<Utc>) -> Result<i64> {
        let limit = self.db.load_settings().await?.monthly_limit;
        self.remaining_under_limit(requester_id, limit, now).await
    }

    pub async fn allowed_at(&self, requester_id: i64, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.remaining_at(requester_id, now).await? > 0)
    }

    pub(crate) async fn remaining_under_limit(
        &self,
        requester_id: i64,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let (start, end) = month_bounds(now)?;
        let used = self
            .db
            .count_successful_generations(requester_id, start, end)
            .await?;
        Ok((limit - used).max(0))
    }
}

/// `[first instant of now's UTC calendar month, first instant of the next)`.
pub fn month_bounds(now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("invalid month start for {now}"))?;
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("invalid month end for {now}"))?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::logs::tests::log_at;
    use crate::crud::settings::MONTHLY_LIMIT_KEY;

    #[test]
    fn month_bounds_roll_over_december() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = month_bounds(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    async fn guard_with_limit(limit: i64) -> (QuotaGuard, DB) {
        let db = DB::new_in_memory().await.unwrap();
        db.set_setting(MONTHLY_LIMIT_KEY, &limit.to_string())
            .await
            .unwrap();
        (QuotaGuard::new(db.clone()), db)
    }

    #[tokio::test]
    async fn allowed_until_the_limit_is_reached() {
        let limit = 3;
        let (guard, db) = guard_with_limit(limit).await;
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

        for _ in 0..limit - 1 {
            db.append_generation_log(&log_at(5, true, now)).await.unwrap();
        }
        assert_eq!(guard.remaining_at(5, now).await.unwrap(), 1);
        assert!(guard.allowed_at(5, now).await.unwrap());

        db.append_generation_log(&log_at(5, true, now)).await.unwrap();
        assert_eq!(guard.remaining_at(5, now).await.unwrap(), 0);
        assert!(!guard.allowed_at(5, now).await.unwrap());
    }

    #[tokio::test]
    async fn failures_and_previous_months_do_not_count() {
        let (guard, db) = guard_with_limit(1).await;
        let now = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();

        db.append_generation_log(&log_at(5, false, now)).await.unwrap();
        db.append_generation_log(&log_at(5, true, now - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        db.append_generation_log(&log_at(6, true, now)).await.unwrap();

        assert!(guard.allowed_at(5, now).await.unwrap());
        // calendar month, not a rolling window
        let next_month = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        assert!(guard.allowed_at(6, next_month).await.unwrap());
        assert!(!guard.allowed_at(6, now).await.unwrap());
    }

    #[tokio::test]
    async fn remaining_never_goes_negative() {
        let (guard, db) = guard_with_limit(1).await;
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        for _ in 0..3 {
            db.append_generation_log(&log_at(5, true, now)).await.unwrap();
        }
        assert_eq!(guard.remaining_at(5, now).await.unwrap(), 0);
    }
}
