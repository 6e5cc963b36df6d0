pub mod anthropic;
pub mod client;
pub mod openai;
pub mod secrets;

pub use client::{
    ChatCompletion, CompletionRequest, ProviderError, ProviderKind, RawCompletion, build_client,
    http_client,
};
pub use secrets::{Vault, VaultError, VaultKeySource};
