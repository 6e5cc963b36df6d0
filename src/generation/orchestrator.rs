use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::crud::DB;
use crate::llm::{
    ChatCompletion, CompletionRequest, ProviderKind, Vault, VaultError, build_client,
};

use super::audit::{Attempt, AuditLogger};
use super::cost::estimate_cost;
use super::error::GenerationError;
use super::parser::parse_questions;
use super::prompt::{SYSTEM_PROMPT, build_prompt};
use super::question::GeneratedQuestion;
use super::quota::QuotaGuard;
use super::request::GenerationRequest;

/// A provider ready to be called: settings plus a client holding the decrypted key.
pub struct ResolvedProvider {
    /// Row to charge usage to; `None` for providers not backed by storage.
    pub config_id: Option<i64>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub client: Box<dyn ChatCompletion>,
}

impl ResolvedProvider {
    pub fn kind(&self) -> ProviderKind {
        self.client.kind()
    }
}

/// Decides which provider serves a generation call.
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// `Ok(None)` means no provider is configured.
    async fn resolve(&self) -> Result<Option<ResolvedProvider>, GenerationError>;
}

/// Resolves the active row of `provider_configs`, decrypting its key with the vault.
///
/// A vault that failed to load is only reported once a stored credential
/// actually has to be decrypted.
pub struct StoredProviderResolver {
    db: DB,
    vault: Result<Arc<Vault>, VaultError>,
    http: reqwest::Client,
}

impl StoredProviderResolver {
    pub fn new(db: DB, vault: Arc<Vault>, http: reqwest::Client) -> Self {
        Self {
            db,
            vault: Ok(vault),
            http,
        }
    }

    /// Loads the vault secret from the environment or its secret file.
    pub fn from_env(db: DB, http: reqwest::Client) -> Self {
        let vault = Vault::from_env().map(|(vault, source)| {
            debug!(source = source.description(), "vault secret loaded");
            Arc::new(vault)
        });
        Self { db, vault, http }
    }
}

#[async_trait]
impl ProviderResolver for StoredProviderResolver {
    async fn resolve(&self) -> Result<Option<ResolvedProvider>, GenerationError> {
        let Some(config) = self.db.active_provider_config().await? else {
            return Ok(None);
        };

        let vault = self.vault.as_ref().map_err(|err| {
            GenerationError::Configuration(format!(
                "credentials of provider config {} cannot be decrypted: {err}",
                config.id
            ))
        })?;
        let api_key = vault.decrypt(&config.encrypted_api_key).map_err(|err| {
            GenerationError::Configuration(format!(
                "credentials of provider config {} are unusable: {err}",
                config.id
            ))
        })?;

        let client = build_client(
            config.provider,
            api_key,
            config.base_url.as_deref(),
            self.http.clone(),
        );

        Ok(Some(ResolvedProvider {
            config_id: Some(config.id),
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub questions: Vec<GeneratedQuestion>,
    pub tokens_used: u32,
    pub provider: ProviderKind,
    pub model: String,
    pub cost_estimate: f64,
}

/// Runs one generation request end to end.
///
/// Failures before the provider call (validation, disabled AI, quota, no
/// provider) leave no audit row. Every attempt that reaches the provider
/// leaves exactly one, successful or not.
pub struct QuestionGenerator<R> {
    db: DB,
    resolver: R,
    quota: QuotaGuard,
    audit: AuditLogger,
}

impl<R: ProviderResolver> QuestionGenerator<R> {
    pub fn new(db: DB, resolver: R) -> Self {
        Self {
            quota: QuotaGuard::new(db.clone()),
            audit: AuditLogger::new(db.clone()),
            db,
            resolver,
        }
    }

    pub fn quota(&self) -> &QuotaGuard {
        &self.quota
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.generate_at(request, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        request: &GenerationRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, GenerationError> {
        request.validate()?;

        let settings = self.db.load_settings().await?;
        if !settings.ai_enabled {
            return Err(GenerationError::Configuration(
                "AI question generation is disabled".to_string(),
            ));
        }

        let remaining = self
            .quota
            .remaining_under_limit(request.requester_id, settings.monthly_limit, now)
            .await?;
        if remaining <= 0 {
            info!(
                requester_id = request.requester_id,
                limit = settings.monthly_limit,
                "monthly generation quota exhausted"
            );
            return Err(GenerationError::QuotaExceeded {
                limit: settings.monthly_limit,
            });
        }

        let provider = self.resolver.resolve().await?.ok_or_else(|| {
            GenerationError::Configuration("no active AI provider is configured".to_string())
        })?;
        let kind = provider.kind();

        let prompt = build_prompt(request);
        info!(
            requester_id = request.requester_id,
            %kind,
            model = %provider.model,
            count = request.count,
            question_type = %request.question_type,
            "requesting questions"
        );
        debug!(prompt_chars = prompt.chars().count(), remaining, "prompt built");

        let attempt = Attempt {
            request,
            provider: kind,
            model: &provider.model,
            at: now,
        };

        let completion = match provider
            .client
            .complete(&CompletionRequest {
                system: SYSTEM_PROMPT,
                prompt: &prompt,
                model: &provider.model,
                temperature: provider.temperature,
                max_tokens: provider.max_tokens,
            })
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                warn!(requester_id = request.requester_id, %kind, error = %err, "provider call failed");
                if let Err(log_err) = self.audit.record_failure(attempt, &err).await {
                    error!(error = ?log_err, "failed to write failure audit log");
                }
                return Err(err.into());
            }
        };

        if let Some(config_id) = provider.config_id
            && let Err(err) = self.db.record_provider_usage(config_id, now).await
        {
            error!(config_id, error = ?err, "failed to record provider usage");
        }

        let questions = parse_questions(&completion.text, usize::from(request.count));
        let fallback = questions.iter().filter(|q| q.needs_review()).count();
        if questions.is_empty() {
            warn!(requester_id = request.requester_id, "no questions could be parsed from the response");
        } else if fallback > 0 {
            warn!(fallback, "questions recovered by the fallback parser, answers need review");
        }

        let cost_estimate = estimate_cost(u64::from(completion.tokens_used), kind.as_str());
        self.audit
            .record_success(attempt, &completion, &questions, cost_estimate)
            .await?;

        info!(
            requester_id = request.requester_id,
            questions = questions.len(),
            tokens = completion.tokens_used,
            cost_estimate,
            "generation finished"
        );

        Ok(GenerationOutcome {
            questions,
            tokens_used: completion.tokens_used,
            provider: kind,
            model: completion.resolved_model,
            cost_estimate,
        })
    }
}
