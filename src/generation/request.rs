use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::GenerationError;

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 12;
pub const MIN_COUNT: u8 = 1;
pub const MAX_COUNT: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Wording used inside the prompt.
    pub fn label_ar(&self) -> &'static str {
        match self {
            Difficulty::Easy => "سهل",
            Difficulty::Medium => "متوسط",
            Difficulty::Hard => "صعب",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(GenerationError::validation(format!(
                "difficulty must be easy, medium or hard, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    General,
    PassageBased,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::General => "general",
            QuestionType::PassageBased => "passage-based",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "general" => Ok(QuestionType::General),
            "passage-based" | "passage" => Ok(QuestionType::PassageBased),
            other => Err(GenerationError::validation(format!(
                "type must be general or passage-based, got '{other}'"
            ))),
        }
    }
}

/// Parameters of one generation call. Built per call and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub requester_id: i64,
    pub subject_id: Option<i64>,
    /// Human-readable subject, only used to phrase the prompt.
    pub subject_name: Option<String>,
    pub grade: u8,
    pub difficulty: Difficulty,
    pub count: u8,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub topic: Option<String>,
    pub passage_text: Option<String>,
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.requester_id <= 0 {
            return Err(GenerationError::validation("requester id is required"));
        }
        if !(MIN_GRADE..=MAX_GRADE).contains(&self.grade) {
            return Err(GenerationError::validation(format!(
                "grade must be between {MIN_GRADE} and {MAX_GRADE}, got {}",
                self.grade
            )));
        }
        if !(MIN_COUNT..=MAX_COUNT).contains(&self.count) {
            return Err(GenerationError::validation(format!(
                "question count must be between {MIN_COUNT} and {MAX_COUNT}, got {}",
                self.count
            )));
        }
        if self.question_type == QuestionType::PassageBased && self.passage().is_none() {
            return Err(GenerationError::validation(
                "passage-based generation requires passage text",
            ));
        }
        Ok(())
    }

    pub fn topic(&self) -> Option<&str> {
        non_blank(self.topic.as_deref())
    }

    pub fn passage(&self) -> Option<&str> {
        non_blank(self.passage_text.as_deref())
    }

    pub fn subject_name(&self) -> Option<&str> {
        non_blank(self.subject_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn general_request() -> GenerationRequest {
        GenerationRequest {
            requester_id: 42,
            subject_id: Some(3),
            subject_name: Some("الرياضيات".to_string()),
            grade: 7,
            difficulty: Difficulty::Medium,
            count: 5,
            question_type: QuestionType::General,
            topic: Some("الكسور".to_string()),
            passage_text: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(general_request().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_grade_and_count() {
        for grade in [0, 13] {
            let request = GenerationRequest {
                grade,
                ..general_request()
            };
            assert!(matches!(
                request.validate(),
                Err(GenerationError::Validation(_))
            ));
        }
        for count in [0, 21] {
            let request = GenerationRequest {
                count,
                ..general_request()
            };
            assert!(matches!(
                request.validate(),
                Err(GenerationError::Validation(_))
            ));
        }
        let edges = GenerationRequest {
            grade: 12,
            count: 20,
            ..general_request()
        };
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn passage_based_requires_non_blank_passage() {
        let mut request = GenerationRequest {
            question_type: QuestionType::PassageBased,
            passage_text: Some("   ".to_string()),
            ..general_request()
        };
        assert!(request.validate().is_err());

        request.passage_text = Some("كان يا ما كان".to_string());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn missing_requester_is_rejected() {
        let request = GenerationRequest {
            requester_id: 0,
            ..general_request()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn parses_caller_strings() {
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(
            "passage_based".parse::<QuestionType>().unwrap(),
            QuestionType::PassageBased
        );
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn serializes_type_with_wire_names() {
        let json = serde_json::to_value(general_request()).unwrap();
        assert_eq!(json["type"], "general");
        assert_eq!(json["difficulty"], "medium");
    }
}
