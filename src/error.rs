use std::fmt;

use thiserror::Error;

/// Failure reported by the completion or search service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Network(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("invalid API key")]
    Unauthorized,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::InvalidResponse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

/// Which service call of a turn was in flight when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Search { round: u32 },
    Analysis { round: u32 },
    Decision { round: u32 },
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Search { round } => write!(f, "web search (round {round})"),
            Stage::Analysis { round } => write!(f, "analysis (round {round})"),
            Stage::Decision { round } => write!(f, "continuation decision (round {round})"),
            Stage::Synthesis => write!(f, "final synthesis"),
        }
    }
}

/// A research turn aborted by a service failure. No partial answer exists.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct ResearchError {
    pub stage: Stage,
    #[source]
    pub source: ServiceError,
}

impl ResearchError {
    pub fn new(stage: Stage, source: ServiceError) -> Self {
        Self { stage, source }
    }
}
