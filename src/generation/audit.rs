use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crud::{DB, NewGenerationLog};
use crate::llm::{ProviderError, ProviderKind, RawCompletion};

use super::question::GeneratedQuestion;
use super::request::GenerationRequest;

/// What is known about an attempt once it reaches the provider stage.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    pub request: &'a GenerationRequest,
    pub provider: ProviderKind,
    pub model: &'a str,
    pub at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LoggedResponse<'a> {
    model: &'a str,
    tokens_used: u32,
    raw_text: &'a str,
    questions: &'a [GeneratedQuestion],
}

/// Append-only writer for `generation_logs`.
#[derive(Clone)]
pub struct AuditLogger {
    db: DB,
}

impl AuditLogger {
    pub fn new(db: DB) -> Self {
        Self { db }
    }

    pub async fn record_success(
        &self,
        attempt: Attempt<'_>,
        completion: &RawCompletion,
        questions: &[GeneratedQuestion],
        cost_estimate: f64,
    ) -> Result<i64> {
        let response_json = serde_json::to_string(&LoggedResponse {
            model: &completion.resolved_model,
            tokens_used: completion.tokens_used,
            raw_text: &completion.text,
            questions,
        })
        .context("Failed to serialize generation response")?;

        let mut log = base_log(attempt)?;
        log.model = Some(completion.resolved_model.clone());
        log.questions_generated = questions.len() as i64;
        log.tokens_used = i64::from(completion.tokens_used);
        log.cost_estimate = cost_estimate;
        log.response_json = Some(response_json);
        log.success = true;

        self.db.append_generation_log(&log).await
    }

    /// Failed attempts record zero questions, zero tokens and no response.
    pub async fn record_failure(&self, attempt: Attempt<'_>, error: &ProviderError) -> Result<i64> {
        let mut log = base_log(attempt)?;
        log.error_message = Some(error.to_string());

        self.db.append_generation_log(&log).await
    }
}

fn base_log(attempt: Attempt<'_>) -> Result<NewGenerationLog> {
    let request = attempt.request;
    let request_json =
        serde_json::to_string(request).context("Failed to serialize generation request")?;

    Ok(NewGenerationLog {
        requester_id: request.requester_id,
        provider: attempt.provider.as_str().to_string(),
        model: Some(attempt.model.to_string()),
        prompt_type: request.question_type.as_str().to_string(),
        subject_id: request.subject_id,
        grade: i64::from(request.grade),
        difficulty: request.difficulty.as_str().to_string(),
        questions_generated: 0,
        tokens_used: 0,
        cost_estimate: 0.0,
        request_json,
        response_json: None,
        success: false,
        error_message: None,
        created_at: attempt.at,
    })
}
