use thiserror::Error;

use super::prompts::NO_KEYWORDS;

/// Parsed continuation verdict for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub needs_more: bool,
    pub keywords: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionParseError {
    #[error("expected 2 lines, got {0}")]
    TooFewLines(usize),
    #[error("line {0} has no ':' separator")]
    MissingColon(usize),
}

impl Decision {
    /// The fail-safe verdict: stop searching.
    pub fn stop() -> Self {
        Self {
            needs_more: false,
            keywords: String::new(),
        }
    }

    /// Parse the two-line `필요여부: ... / 키워드: ...` reply.
    ///
    /// Only the text after the first colon of each line matters, so the labels
    /// themselves are not checked. The keyword value is returned as written.
    /// A value of `없음` (optionally quoted) clears the keywords and forces
    /// `needs_more` to false.
    pub fn parse(input: &str) -> Result<Self, DecisionParseError> {
        // No trimming of the whole reply: a leading blank line is a malformed verdict.
        let lines: Vec<&str> = input.lines().collect();
        if lines.len() < 2 {
            return Err(DecisionParseError::TooFewLines(lines.len()));
        }

        let verdict = after_colon(lines[0]).ok_or(DecisionParseError::MissingColon(1))?;
        let keywords = after_colon(lines[1]).ok_or(DecisionParseError::MissingColon(2))?;

        if is_no_keywords(keywords) {
            return Ok(Self::stop());
        }

        Ok(Self {
            needs_more: verdict.to_lowercase() == "yes",
            keywords: keywords.to_string(),
        })
    }

    /// Whether this verdict asks for another round with something to search for.
    pub fn wants_another_round(&self) -> bool {
        self.needs_more && !self.keywords.is_empty()
    }
}

fn after_colon(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, rest)| rest.trim())
}

fn is_no_keywords(value: &str) -> bool {
    value.trim_matches(|c: char| c == '"' || c == '\'').trim().to_lowercase() == NO_KEYWORDS
}
