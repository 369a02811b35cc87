mod basic;
mod gender;
mod pronunciation;
pub mod stats;

use crate::error::FailureKind;

pub use basic::{BasicMetrics, BasicMetricsParser, BASIC_FIELD_COUNT, PRONUNCIATION_TOKEN};
pub use gender::{
    BucketCheck, Gender, GenderMood, GenderMoodBucket, GenderMoodClassifier, Mood, BUCKETS,
};
pub use pronunciation::PronunciationScorer;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("engine payload is empty")]
    EmptyPayload,

    #[error("expected at least {expected} tokens, got {got}")]
    TooFewTokens { expected: usize, got: usize },

    #[error("expected exactly {expected} tokens, got {got}")]
    TokenCount { expected: usize, got: usize },

    #[error("field {field}: cannot parse {token:?}")]
    InvalidField { field: &'static str, token: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("probability must lie in [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("cannot build {distribution} distribution: {details}")]
    Distribution {
        distribution: &'static str,
        details: String,
    },
}

impl ClassificationError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ClassificationFailure
    }
}

/// Rounds on the exact decimal expansion, so binary near-ties resolve like decimal
/// rounding and huge magnitudes never overflow.
pub(crate) fn round3(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}

pub(crate) fn tokens(raw: &str) -> Result<Vec<&str>, ParseError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ParseError::EmptyPayload);
    }
    Ok(tokens)
}
