use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::crud::DB;
use crate::generation::{
    GeneratedQuestion, GenerationError, GenerationOutcome, GenerationRequest, QuestionGenerator,
    StoredProviderResolver,
};
use crate::generation::prompt::OPTION_LABELS;
use crate::llm::http_client;
use crate::palette::Palette;
use crate::utils::pluralize;

pub async fn run(
    db: &DB,
    config: &AppConfig,
    mut request: GenerationRequest,
    passage_file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(path) = passage_file {
        let passage = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read passage file {}", path.display()))?;
        request.passage_text = Some(passage);
    }

    let resolver = StoredProviderResolver::from_env(db.clone(), http_client(config.http_timeout)?);
    let generator = QuestionGenerator::new(db.clone(), resolver);

    let outcome = match generator.generate(&request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{}", describe_failure(&err));
            return Err(err.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// One-line hint telling the user what to do about a failure.
fn describe_failure(err: &GenerationError) -> String {
    use crate::generation::ErrorKind;

    let hint = match err.kind() {
        ErrorKind::Validation => "Check the request parameters.",
        ErrorKind::Quota => "Monthly allowance used up; try again next month.",
        ErrorKind::Configuration => "Ask an administrator to configure an AI provider.",
        ErrorKind::Provider => "The AI service is unavailable right now; try again later.",
        ErrorKind::Storage => "Local storage failed; see the error below.",
    };
    format!(
        "{} {}",
        Palette::paint(Palette::DANGER, format!("[{}]", err.kind().as_str())),
        hint
    )
}

fn print_outcome(outcome: &GenerationOutcome) {
    println!(
        "{} {} via {} ({})",
        Palette::paint(Palette::SUCCESS, "Generated"),
        pluralize("question", outcome.questions.len()),
        Palette::paint(Palette::INFO, outcome.provider),
        outcome.model
    );
    println!(
        "{}",
        Palette::dim(format!(
            "{} tokens, ~${:.4}",
            outcome.tokens_used, outcome.cost_estimate
        ))
    );

    for (idx, question) in outcome.questions.iter().enumerate() {
        println!("\n{}", render_question(idx + 1, question));
    }
}

fn render_question(number: usize, question: &GeneratedQuestion) -> String {
    let mut out = format!("{number}. {}", question.text);
    if question.needs_review() {
        out.push_str(&format!(
            " {}",
            Palette::paint(Palette::WARNING, "(answer needs review)")
        ));
    }
    for (idx, (label, option)) in OPTION_LABELS.iter().zip(&question.options).enumerate() {
        let line = format!("   {label}) {option}");
        if idx == question.correct_index {
            out.push_str(&format!("\n{}", Palette::paint(Palette::SUCCESS, line)));
        } else {
            out.push_str(&format!("\n{line}"));
        }
    }
    out.push_str(&format!(
        "\n   {} {}",
        Palette::dim("answer:"),
        question.correct_option()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ParseStrategy;
    use crate::utils::strip_controls_and_escapes;

    #[test]
    fn render_question_highlights_answer_and_flags_fallback() {
        let question = GeneratedQuestion::new(
            "ما ناتج 3 × 3؟".to_string(),
            ["6".into(), "9".into(), "12".into(), "3".into()],
            1,
            ParseStrategy::Primary,
        );
        let rendered = render_question(2, &question);
        assert!(rendered.contains("\u{1b}[32m   ب) 9\u{1b}[0m"));
        assert!(!rendered.contains("needs review"));
        assert!(strip_controls_and_escapes(&rendered).ends_with("answer: 9"));

        let fallback = GeneratedQuestion::new(
            "ما ناتج 3 × 3؟".to_string(),
            ["6".into(), "9".into(), "12".into(), "3".into()],
            0,
            ParseStrategy::Fallback,
        );
        let stripped = strip_controls_and_escapes(&render_question(1, &fallback));
        assert!(stripped.starts_with("1. ما ناتج 3 × 3؟ (answer needs review)"));
    }

    #[test]
    fn failure_hints_follow_error_kind() {
        let quota = describe_failure(&GenerationError::QuotaExceeded { limit: 10 });
        assert!(quota.contains("[quota]"));
        assert!(quota.contains("next month"));

        let config = describe_failure(&GenerationError::Configuration("none".into()));
        assert!(config.contains("administrator"));
    }
}
