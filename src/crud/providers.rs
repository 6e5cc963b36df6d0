use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;

use crate::llm::ProviderKind;

use super::DB;

/// A stored provider configuration. The API key is only ever held encrypted here.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: i64,
    pub provider: ProviderKind,
    pub encrypted_api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub base_url: Option<String>,
    pub is_active: bool,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProviderConfig {
    pub provider: ProviderKind,
    pub encrypted_api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub base_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ProviderConfigRow {
    id: i64,
    provider: String,
    encrypted_api_key: String,
    model: String,
    temperature: f64,
    max_tokens: i64,
    base_url: Option<String>,
    is_active: bool,
    usage_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProviderConfigRow> for ProviderConfig {
    type Error = anyhow::Error;

    fn try_from(row: ProviderConfigRow) -> Result<Self> {
        let provider = row
            .provider
            .parse::<ProviderKind>()
            .map_err(|err| anyhow!("provider config {}: {err}", row.id))?;
        let max_tokens = u32::try_from(row.max_tokens)
            .map_err(|_| anyhow!("provider config {}: invalid max_tokens", row.id))?;

        Ok(Self {
            id: row.id,
            provider,
            encrypted_api_key: row.encrypted_api_key,
            model: row.model,
            temperature: row.temperature,
            max_tokens,
            base_url: row.base_url,
            is_active: row.is_active,
            usage_count: row.usage_count,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        })
    }
}

const SELECT_PROVIDER_CONFIG: &str = r#"
    SELECT
        id,
        provider,
        encrypted_api_key,
        model,
        temperature,
        max_tokens,
        base_url,
        is_active,
        usage_count,
        last_used_at,
        created_at
    FROM provider_configs
"#;

impl DB {
    pub async fn add_provider_config(&self, config: &NewProviderConfig) -> Result<i64> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO provider_configs (
                provider,
                encrypted_api_key,
                model,
                temperature,
                max_tokens,
                base_url,
                is_active,
                usage_count,
                last_used_at,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, 0, NULL, ?)
            "#,
        )
        .bind(config.provider.as_str())
        .bind(&config.encrypted_api_key)
        .bind(&config.model)
        .bind(config.temperature)
        .bind(i64::from(config.max_tokens))
        .bind(&config.base_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        let query = format!("{SELECT_PROVIDER_CONFIG} ORDER BY id");
        let mut rows = sqlx::query_as::<_, ProviderConfigRow>(&query).fetch(&self.pool);

        let mut configs = Vec::new();
        while let Some(row) = rows.try_next().await? {
            configs.push(ProviderConfig::try_from(row)?);
        }
        Ok(configs)
    }

    /// The active configuration, if any. Should several rows be flagged active
    /// (written outside this crate), the most recently created one wins.
    pub async fn active_provider_config(&self) -> Result<Option<ProviderConfig>> {
        let query =
            format!("{SELECT_PROVIDER_CONFIG} WHERE is_active = 1 ORDER BY id DESC LIMIT 1");
        let row = sqlx::query_as::<_, ProviderConfigRow>(&query)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProviderConfig::try_from).transpose()
    }

    /// Makes `id` the only active configuration.
    pub async fn activate_provider_config(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM provider_configs WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            bail!("No provider config with id {id}");
        }

        sqlx::query("UPDATE provider_configs SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE provider_configs SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_provider_config(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM provider_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bumps the usage counter in a single statement so concurrent callers never lose an increment.
    pub async fn record_provider_usage(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE provider_configs
            SET
                usage_count = usage_count + 1,
                last_used_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
