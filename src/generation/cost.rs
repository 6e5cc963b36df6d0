//! Rough spend estimates for dashboards. Not billing-grade: real vendor
//! prices differ per model and between input and output tokens.

/// USD per 1,000 tokens.
const RATES_PER_1K: &[(&str, f64)] = &[("openai", 0.002), ("anthropic", 0.003)];

pub const DEFAULT_RATE_PER_1K: f64 = 0.002;

pub fn rate_per_1k(provider: &str) -> f64 {
    RATES_PER_1K
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(provider.trim()))
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE_PER_1K)
}

pub fn estimate_cost(tokens: u64, provider: &str) -> f64 {
    tokens as f64 / 1000.0 * rate_per_1k(provider)
}
