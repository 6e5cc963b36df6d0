use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;

use super::DB;

/// One generation attempt, as written by the audit logger.
#[derive(Debug, Clone)]
pub struct NewGenerationLog {
    pub requester_id: i64,
    pub provider: String,
    pub model: Option<String>,
    pub prompt_type: String,
    pub subject_id: Option<i64>,
    pub grade: i64,
    pub difficulty: String,
    pub questions_generated: i64,
    pub tokens_used: i64,
    pub cost_estimate: f64,
    pub request_json: String,
    pub response_json: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GenerationLog {
    pub id: i64,
    pub requester_id: i64,
    pub provider: String,
    pub model: Option<String>,
    pub prompt_type: String,
    pub subject_id: Option<i64>,
    pub grade: i64,
    pub difficulty: String,
    pub questions_generated: i64,
    pub tokens_used: i64,
    pub cost_estimate: f64,
    pub request_json: String,
    pub response_json: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct UsageSummary {
    pub successful: i64,
    pub failed: i64,
    pub questions_generated: i64,
    pub tokens_used: i64,
    pub cost_estimate: f64,
}

// Fixed-width UTC timestamps keep lexicographic order equal to time order,
// which the month-range queries below rely on.
fn sortable_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl DB {
    /// Appends an audit row. There is intentionally no update or delete counterpart.
    pub async fn append_generation_log(&self, log: &NewGenerationLog) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO generation_logs (
                requester_id,
                provider,
                model,
                prompt_type,
                subject_id,
                grade,
                difficulty,
                questions_generated,
                tokens_used,
                cost_estimate,
                request_json,
                response_json,
                success,
                error_message,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.requester_id)
        .bind(&log.provider)
        .bind(&log.model)
        .bind(&log.prompt_type)
        .bind(log.subject_id)
        .bind(log.grade)
        .bind(&log.difficulty)
        .bind(log.questions_generated)
        .bind(log.tokens_used)
        .bind(log.cost_estimate)
        .bind(&log.request_json)
        .bind(&log.response_json)
        .bind(log.success)
        .bind(&log.error_message)
        .bind(sortable_timestamp(log.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Successful attempts by `requester_id` with `start <= created_at < end`.
    pub async fn count_successful_generations(
        &self,
        requester_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(1)
            FROM generation_logs
            WHERE requester_id = ?
              AND success = 1
              AND created_at >= ?
              AND created_at < ?
            "#,
        )
        .bind(requester_id)
        .bind(sortable_timestamp(start))
        .bind(sortable_timestamp(end))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn usage_summary(
        &self,
        requester_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<UsageSummary> {
        let summary = sqlx::query_as::<_, UsageSummary>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0) AS successful,
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(questions_generated), 0) AS questions_generated,
                COALESCE(SUM(tokens_used), 0) AS tokens_used,
                COALESCE(SUM(cost_estimate), 0.0) AS cost_estimate
            FROM generation_logs
            WHERE requester_id = ?
              AND created_at >= ?
              AND created_at < ?
            "#,
        )
        .bind(requester_id)
        .bind(sortable_timestamp(start))
        .bind(sortable_timestamp(end))
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Newest first.
    pub async fn recent_generation_logs(
        &self,
        requester_id: i64,
        limit: u32,
    ) -> Result<Vec<GenerationLog>> {
        let mut rows = sqlx::query_as::<_, GenerationLog>(
            r#"
            SELECT
                id,
                requester_id,
                provider,
                model,
                prompt_type,
                subject_id,
                grade,
                difficulty,
                questions_generated,
                tokens_used,
                cost_estimate,
                request_json,
                response_json,
                success,
                error_message,
                created_at
            FROM generation_logs
            WHERE requester_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(requester_id)
        .bind(i64::from(limit))
        .fetch(&self.pool);

        let mut logs = Vec::new();
        while let Some(row) = rows.try_next().await? {
            logs.push(row);
        }
        Ok(logs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn log_at(requester_id: i64, success: bool, at: DateTime<Utc>) -> NewGenerationLog {
        NewGenerationLog {
            requester_id,
            provider: "openai".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            prompt_type: "general".to_string(),
            subject_id: None,
            grade: 7,
            difficulty: "medium".to_string(),
            questions_generated: if success { 5 } else { 0 },
            tokens_used: if success { 1000 } else { 0 },
            cost_estimate: if success { 0.002 } else { 0.0 },
            request_json: "{}".to_string(),
            response_json: success.then(|| "{}".to_string()),
            success,
            error_message: (!success).then(|| "boom".to_string()),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn counts_only_successes_inside_the_range() {
        let db = DB::new_in_memory().await.unwrap();
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();

        db.append_generation_log(&log_at(1, true, start)).await.unwrap();
        db.append_generation_log(&log_at(1, true, start + chrono::Duration::days(18)))
            .await
            .unwrap();
        db.append_generation_log(&log_at(1, false, start + chrono::Duration::days(2)))
            .await
            .unwrap();
        db.append_generation_log(&log_at(1, true, end)).await.unwrap();
        db.append_generation_log(&log_at(1, true, start - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        db.append_generation_log(&log_at(2, true, start + chrono::Duration::days(3)))
            .await
            .unwrap();

        let count = db.count_successful_generations(1, start, end).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn usage_summary_aggregates_attempts() {
        let db = DB::new_in_memory().await.unwrap();
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        let at = start + chrono::Duration::days(5);

        db.append_generation_log(&log_at(9, true, at)).await.unwrap();
        db.append_generation_log(&log_at(9, true, at)).await.unwrap();
        db.append_generation_log(&log_at(9, false, at)).await.unwrap();

        let summary = db.usage_summary(9, start, end).await.unwrap();
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.questions_generated, 10);
        assert_eq!(summary.tokens_used, 2000);
        assert!((summary.cost_estimate - 0.004).abs() < 1e-9);

        let empty = db.usage_summary(10, start, end).await.unwrap();
        assert_eq!(empty, UsageSummary::default());
    }

    #[tokio::test]
    async fn recent_logs_are_newest_first() {
        let db = DB::new_in_memory().await.unwrap();
        let base = Utc.with_ymd_and_hms(2026, 10, 10, 8, 0, 0).unwrap();

        db.append_generation_log(&log_at(3, true, base)).await.unwrap();
        db.append_generation_log(&log_at(3, false, base + chrono::Duration::hours(1)))
            .await
            .unwrap();

        let logs = db.recent_generation_logs(3, 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(!logs[0].success);
        assert_eq!(logs[0].error_message.as_deref(), Some("boom"));
        assert_eq!(logs[1].created_at, base);
        assert!(logs[1].response_json.is_some());
    }
}
