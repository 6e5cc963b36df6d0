use serde::Serialize;

pub const OPTION_COUNT: usize = 4;

/// Which parser strategy recovered a question. Fallback questions carry no
/// trustworthy answer and should be reviewed before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStrategy {
    Primary,
    Fallback,
}

/// A complete multiple-choice question. The fixed-size option array makes a
/// partially filled question unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_index: usize,
    pub ai_generated: bool,
    pub origin: ParseStrategy,
}

impl GeneratedQuestion {
    pub fn new(
        text: String,
        options: [String; OPTION_COUNT],
        correct_index: usize,
        origin: ParseStrategy,
    ) -> Self {
        Self {
            text,
            options,
            correct_index: if correct_index < OPTION_COUNT {
                correct_index
            } else {
                0
            },
            ai_generated: true,
            origin,
        }
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn needs_review(&self) -> bool {
        self.origin == ParseStrategy::Fallback
    }
}
