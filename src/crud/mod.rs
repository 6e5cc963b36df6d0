pub mod db;
pub mod logs;
pub mod providers;
pub mod settings;

pub use db::DB;
pub use logs::{GenerationLog, NewGenerationLog, UsageSummary};
pub use providers::{NewProviderConfig, ProviderConfig};
pub use settings::Settings;
