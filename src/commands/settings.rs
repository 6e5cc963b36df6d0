use anyhow::Result;

use crate::crud::DB;
use crate::crud::settings::{AI_ENABLED_KEY, MONTHLY_LIMIT_KEY};

pub async fn run(db: &DB, monthly_limit: Option<u32>, ai_enabled: Option<bool>) -> Result<()> {
    if let Some(limit) = monthly_limit {
        db.set_setting(MONTHLY_LIMIT_KEY, &limit.to_string()).await?;
    }
    if let Some(enabled) = ai_enabled {
        db.set_setting(AI_ENABLED_KEY, if enabled { "true" } else { "false" })
            .await?;
    }

    let settings = db.load_settings().await?;
    println!("{MONTHLY_LIMIT_KEY} = {}", settings.monthly_limit);
    println!("{AI_ENABLED_KEY} = {}", settings.ai_enabled);
    Ok(())
}
