use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::utils::{get_data_dir, trim_line};

pub const DATA_DIR_ENV: &str = "QUIZGEN_DATA_DIR";
pub const HTTP_TIMEOUT_ENV: &str = "QUIZGEN_HTTP_TIMEOUT_SECS";

const DB_FILE_NAME: &str = "quizgen.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Process-level configuration. Business settings (quota limit, AI switch)
/// live in the `settings` table instead, see [`crate::crud::settings`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let data_dir = match env::var(DATA_DIR_ENV)
            .ok()
            .as_deref()
            .and_then(trim_line)
        {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create data directory at {}", dir.display())
                })?;
                dir
            }
            None => get_data_dir()?,
        };

        let http_timeout = parse_timeout(env::var(HTTP_TIMEOUT_ENV).ok().as_deref())?;

        Ok(Self {
            data_dir,
            http_timeout,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

fn parse_timeout(raw: Option<&str>) -> Result<Duration> {
    let Some(value) = raw.and_then(trim_line) else {
        return Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    };
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{HTTP_TIMEOUT_ENV} must be a whole number of seconds"))?;
    Ok(Duration::from_secs(secs.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults_when_unset_or_blank() {
        assert_eq!(parse_timeout(None).unwrap(), Duration::from_secs(60));
        assert_eq!(parse_timeout(Some("  ")).unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn timeout_parses_and_clamps_to_one_second() {
        assert_eq!(parse_timeout(Some("15")).unwrap(), Duration::from_secs(15));
        assert_eq!(parse_timeout(Some("0")).unwrap(), Duration::from_secs(1));
        assert!(parse_timeout(Some("soon")).is_err());
    }

    #[test]
    fn db_path_lives_in_data_dir() {
        let config = AppConfig {
            data_dir: PathBuf::from("/tmp/quizgen"),
            http_timeout: Duration::from_secs(5),
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/quizgen/quizgen.db"));
    }
}
