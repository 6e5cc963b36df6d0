use thiserror::Error;

use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("monthly AI generation limit of {limit} reached, try again next month")]
    QuotaExceeded { limit: i64 },

    #[error("AI generation is not available: {0}")]
    Configuration(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        GenerationError::Storage(err)
    }
}

/// Coarse category a UI can branch on ("try later" vs "contact admin" vs "unavailable").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Quota,
    Configuration,
    Provider,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Quota => "quota",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Provider => "provider",
            ErrorKind::Storage => "storage",
        }
    }
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Validation(_) => ErrorKind::Validation,
            GenerationError::QuotaExceeded { .. } => ErrorKind::Quota,
            GenerationError::Configuration(_) => ErrorKind::Configuration,
            GenerationError::Provider(_) => ErrorKind::Provider,
            GenerationError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        GenerationError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderKind;

    #[test]
    fn provider_errors_keep_upstream_message() {
        let err = GenerationError::from(ProviderError::Api {
            provider: ProviderKind::OpenAi,
            status: 429,
            message: "Rate limit reached".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "openai returned HTTP 429: Rate limit reached");
    }

    #[test]
    fn kinds_are_distinguishable() {
        assert_eq!(
            GenerationError::QuotaExceeded { limit: 5 }.kind().as_str(),
            "quota"
        );
        assert_eq!(
            GenerationError::Configuration("x".into()).kind().as_str(),
            "configuration"
        );
        assert_eq!(
            GenerationError::Storage(anyhow::anyhow!("disk")).kind(),
            ErrorKind::Storage
        );
    }
}
