pub mod commands;
pub mod config;
pub mod crud;
pub mod generation;
pub mod llm;
pub mod palette;
pub mod utils;
