pub mod audit;
pub mod cost;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod question;
pub mod quota;
pub mod request;

pub use error::{ErrorKind, GenerationError};
pub use orchestrator::{
    GenerationOutcome, ProviderResolver, QuestionGenerator, ResolvedProvider,
    StoredProviderResolver,
};
pub use question::{GeneratedQuestion, ParseStrategy};
pub use quota::QuotaGuard;
pub use request::{Difficulty, GenerationRequest, QuestionType};
