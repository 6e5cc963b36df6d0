pub mod generate;
pub mod provider;
pub mod settings;
pub mod usage;
