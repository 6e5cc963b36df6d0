//! Turns raw model output into [`GeneratedQuestion`]s.
//!
//! The primary strategy matches the exact block grammar requested by
//! [`super::prompt`]. Only when it finds nothing does the fallback run: a
//! line scanner that accepts looser numbering and Latin option labels but
//! cannot see the answer line, so every question it recovers gets
//! `correct_index = 0` and is tagged [`ParseStrategy::Fallback`].

use once_cell::sync::Lazy;
use regex::Regex;

use super::prompt::{ANSWER_MARKER, LATIN_OPTION_LABELS, OPTION_LABELS, QUESTION_MARKER};
use super::question::{GeneratedQuestion, OPTION_COUNT, ParseStrategy};
use crate::utils::trim_line;

const OPTION_SEPARATORS: &str = r"[)\].\-:]";

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    let mut pattern = format!(
        r"(?m)^[ \t]*(?:\d+[ \t]*[.)\-][ \t]*)?{QUESTION_MARKER}[ \t]*\d*[ \t]*[:：][ \t]*(?P<question>[^\n]*\S)[ \t]*\n"
    );
    for (idx, label) in OPTION_LABELS.iter().enumerate() {
        pattern.push_str(&format!(
            r"[ \t]*{label}[ \t]*{OPTION_SEPARATORS}[ \t]*(?P<option{idx}>[^\n]*\S)[ \t]*\n"
        ));
    }
    pattern.push_str(&format!(
        r"[ \t]*{ANSWER_MARKER}[ \t]*[:：][ \t]*(?P<answer>[^\n]*?)[ \t]*$"
    ));
    Regex::new(&pattern).expect("block grammar regex is valid")
});

static NUMBERED_QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[ \t]*[.)\-:،][ \t]*(?P<text>\S.*)$").unwrap());

static KEYWORD_QUESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:\d+[ \t]*[.)\-][ \t]*)?(?:{QUESTION_MARKER}|سؤال|(?i:question))[ \t]*\d*[ \t]*[:：.)\-]?[ \t]*(?P<text>[^\s:：.)\-].*)?$"
    ))
    .unwrap()
});

static OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    let labels: String = OPTION_LABELS
        .iter()
        .chain(LATIN_OPTION_LABELS.iter())
        .flat_map(|label| [*label, label.to_ascii_lowercase()])
        .chain(['ا', 'إ'])
        .collect();
    Regex::new(&format!(
        r"^[(\[]?(?P<label>[{labels}])[ \t]*{OPTION_SEPARATORS}[ \t]*(?P<text>\S.*)$"
    ))
    .unwrap()
});

/// Parses `response` into at most `limit` questions. An empty result is a
/// valid outcome, not an error.
pub fn parse_questions(response: &str, limit: usize) -> Vec<GeneratedQuestion> {
    let normalized = response.replace("\r\n", "\n");

    let primary = parse_primary(&normalized, limit);
    if !primary.is_empty() {
        return primary;
    }
    parse_fallback(&normalized, limit)
}

pub fn parse_primary(response: &str, limit: usize) -> Vec<GeneratedQuestion> {
    BLOCK_RE
        .captures_iter(response)
        .take(limit)
        .map(|caps| {
            let options: [String; OPTION_COUNT] =
                std::array::from_fn(|idx| caps[format!("option{idx}").as_str()].trim().to_string());
            let correct_index = answer_index(&caps["answer"]).unwrap_or(0);
            GeneratedQuestion::new(
                caps["question"].trim().to_string(),
                options,
                correct_index,
                ParseStrategy::Primary,
            )
        })
        .collect()
}

/// Maps an answer label to its zero-based index. Accepts the Arabic labels,
/// their Latin equivalents, and common decorations such as `(ب)` or `**B**`.
pub fn answer_index(answer: &str) -> Option<usize> {
    let label = answer
        .trim_matches(|c: char| c.is_whitespace() || "()[]*.:-\"'".contains(c))
        .chars()
        .next()?;
    label_index(label)
}

fn label_index(label: char) -> Option<usize> {
    match label {
        // bare and hamza-below alef are common spellings of the first label
        'ا' | 'إ' => Some(0),
        _ => OPTION_LABELS
            .iter()
            .position(|l| *l == label)
            .or_else(|| {
                LATIN_OPTION_LABELS
                    .iter()
                    .position(|l| *l == label.to_ascii_uppercase())
            }),
    }
}

#[derive(Debug, Default)]
struct PendingQuestion {
    text: String,
    options: Vec<String>,
}

impl PendingQuestion {
    /// Only complete questions survive: extra options are dropped, short ones discarded.
    fn finish(mut self) -> Option<GeneratedQuestion> {
        if self.text.is_empty() || self.options.len() < OPTION_COUNT {
            return None;
        }
        self.options.truncate(OPTION_COUNT);
        let options: [String; OPTION_COUNT] = self.options.try_into().ok()?;
        Some(GeneratedQuestion::new(
            self.text,
            options,
            0,
            ParseStrategy::Fallback,
        ))
    }
}

pub fn parse_fallback(response: &str, limit: usize) -> Vec<GeneratedQuestion> {
    let mut questions = Vec::new();
    let mut pending: Option<PendingQuestion> = None;

    for raw_line in response.lines() {
        if questions.len() >= limit {
            break;
        }
        let Some(line) = clean_line(raw_line) else {
            continue;
        };

        if let Some(caps) = OPTION_RE.captures(&line) {
            if let Some(question) = pending.as_mut() {
                question.options.push(caps["text"].trim().to_string());
            }
            continue;
        }

        let opener = KEYWORD_QUESTION_RE
            .captures(&line)
            .or_else(|| NUMBERED_QUESTION_RE.captures(&line));
        if let Some(caps) = opener {
            if let Some(finished) = pending.take().and_then(PendingQuestion::finish) {
                questions.push(finished);
            }
            pending = Some(PendingQuestion {
                text: caps
                    .name("text")
                    .map(|text| text.as_str().trim().to_string())
                    .unwrap_or_default(),
                options: Vec::new(),
            });
            continue;
        }

        // a bare heading such as `السؤال 1:` takes its text from the next line
        if let Some(question) = pending.as_mut()
            && question.text.is_empty()
            && question.options.is_empty()
        {
            question.text = line;
        }
    }

    if questions.len() < limit
        && let Some(finished) = pending.and_then(PendingQuestion::finish)
    {
        questions.push(finished);
    }

    questions
}

/// Trims a line and strips markdown decoration (bullets, bold markers).
fn clean_line(raw_line: &str) -> Option<String> {
    let line = trim_line(raw_line)?;
    let line = line.replace("**", "");
    let line = line.trim_start_matches(['-', '*', '•', ' ', '\t']);
    trim_line(line).map(str::to_string)
}
