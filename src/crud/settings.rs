use anyhow::{Context, Result};
use tracing::warn;

use super::DB;

pub const MONTHLY_LIMIT_KEY: &str = "ai_monthly_limit";
pub const AI_ENABLED_KEY: &str = "ai_enabled";

pub const DEFAULT_MONTHLY_LIMIT: i64 = 50;

/// Business settings owned by the surrounding application; this crate only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub monthly_limit: i64,
    pub ai_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
            ai_enabled: true,
        }
    }
}

impl DB {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_settings(&self) -> Result<Settings> {
        let defaults = Settings::default();

        let monthly_limit = match self.get_setting(MONTHLY_LIMIT_KEY).await? {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(limit) => limit.max(0),
                Err(_) => {
                    warn!(
                        value = %raw,
                        default = defaults.monthly_limit,
                        "{MONTHLY_LIMIT_KEY} is not a number, using the default"
                    );
                    defaults.monthly_limit
                }
            },
            None => defaults.monthly_limit,
        };

        let ai_enabled = match self.get_setting(AI_ENABLED_KEY).await? {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("Setting {AI_ENABLED_KEY} is not a boolean: {raw}"))?,
            None => defaults.ai_enabled,
        };

        Ok(Settings {
            monthly_limit,
            ai_enabled,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
