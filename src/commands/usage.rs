use anyhow::Result;
use chrono::Utc;

use crate::crud::DB;
use crate::generation::QuotaGuard;
use crate::generation::quota::month_bounds;
use crate::palette::Palette;
use crate::utils::truncate_chars;

pub async fn run(db: &DB, requester_id: i64, recent: u32) -> Result<()> {
    let now = Utc::now();
    let (start, end) = month_bounds(now)?;
    let settings = db.load_settings().await?;
    let remaining = QuotaGuard::new(db.clone())
        .remaining_at(requester_id, now)
        .await?;
    let summary = db.usage_summary(requester_id, start, end).await?;

    println!(
        "Requester {} in {}",
        Palette::paint(Palette::ACCENT, requester_id),
        start.format("%Y-%m")
    );
    println!(
        "  remaining        {} of {}",
        Palette::paint(
            if remaining > 0 {
                Palette::SUCCESS
            } else {
                Palette::DANGER
            },
            remaining
        ),
        settings.monthly_limit
    );
    println!("  successful runs  {}", summary.successful);
    println!("  failed runs      {}", summary.failed);
    println!("  questions        {}", summary.questions_generated);
    println!("  tokens           {}", summary.tokens_used);
    println!("  estimated cost   ~${:.4}", summary.cost_estimate);
    if !settings.ai_enabled {
        println!("{}", Palette::paint(Palette::WARNING, "AI generation is currently disabled."));
    }

    if recent == 0 {
        return Ok(());
    }
    let logs = db.recent_generation_logs(requester_id, recent).await?;
    if logs.is_empty() {
        return Ok(());
    }
    println!("\n{}", Palette::dim("Recent attempts:"));
    for log in logs {
        let status = if log.success {
            Palette::paint(Palette::SUCCESS, "ok  ")
        } else {
            Palette::paint(Palette::DANGER, "fail")
        };
        let detail = match &log.error_message {
            Some(message) => truncate_chars(message, 60),
            None => format!("{} questions, {} tokens", log.questions_generated, log.tokens_used),
        };
        println!(
            "  {} {} {:<9} grade {:>2} {:<6} {}",
            log.created_at.format("%Y-%m-%d %H:%M"),
            status,
            log.provider,
            log.grade,
            log.difficulty,
            detail
        );
    }
    Ok(())
}
