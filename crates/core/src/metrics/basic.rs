use crate::metrics::{
    round3, tokens, Gender, GenderMoodClassifier, Mood, ParseError, PronunciationScorer,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const LOG_TARGET: &str = "metrics::basic";

/// Tokens every basic payload must carry.
pub const BASIC_FIELD_COUNT: usize = 14;
/// Position of the pronunciation probability, one past the required fields.
pub const PRONUNCIATION_TOKEN: usize = 14;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BasicMetrics {
    pub n_syllables: i64,
    pub n_pauses: i64,
    pub speech_rate_w_pause: f64,
    pub speech_rate_wo_pause: f64,
    pub speaking_dur: f64,
    pub total_dur: f64,
    pub pct_speaking: f64,
    pub f0_mean: f64,
    pub f0_std: f64,
    pub f0_median: f64,
    pub f0_min: i64,
    pub f0_max: i64,
    pub f0_q25: i64,
    pub f0_q75: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pron_score: Option<f64>,
}

fn field<T: FromStr>(token: &str, name: &'static str) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidField {
        field: name,
        token: token.to_owned(),
    })
}

impl BasicMetrics {
    /// Reads the 14 positional fields. Any bad token discards the whole record.
    pub fn from_tokens(tokens: &[&str]) -> Result<Self, ParseError> {
        if tokens.len() < BASIC_FIELD_COUNT {
            return Err(ParseError::TooFewTokens {
                expected: BASIC_FIELD_COUNT,
                got: tokens.len(),
            });
        }
        Ok(Self {
            n_syllables: field(tokens[0], "n_syllables")?,
            n_pauses: field(tokens[1], "n_pauses")?,
            speech_rate_w_pause: field(tokens[2], "speech_rate_w_pause")?,
            speech_rate_wo_pause: field(tokens[3], "speech_rate_wo_pause")?,
            speaking_dur: field(tokens[4], "speaking_dur")?,
            total_dur: field(tokens[5], "total_dur")?,
            pct_speaking: field(tokens[6], "pct_speaking")?,
            f0_mean: field(tokens[7], "f0_mean")?,
            f0_std: field(tokens[8], "f0_std")?,
            f0_median: field(tokens[9], "f0_median")?,
            f0_min: field(tokens[10], "f0_min")?,
            f0_max: field(tokens[11], "f0_max")?,
            f0_q25: field(tokens[12], "f0_q25")?,
            f0_q75: field(tokens[13], "f0_q75")?,
            gender: None,
            mood: None,
            pron_score: None,
        })
    }
}

/// Turns the basic script's payload into [`BasicMetrics`], then enriches it with
/// gender/mood and a pronunciation score when the payload carries the probability token.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicMetricsParser {
    classifier: GenderMoodClassifier,
    scorer: PronunciationScorer,
}

impl BasicMetricsParser {
    pub fn parse(&self, raw: &str) -> Result<BasicMetrics, ParseError> {
        self.parse_with(&mut rand::rng(), raw)
    }

    pub fn parse_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        raw: &str,
    ) -> Result<BasicMetrics, ParseError> {
        let tokens = tokens(raw)?;
        let mut metrics = BasicMetrics::from_tokens(&tokens)?;

        let Some(probability_token) = tokens.get(PRONUNCIATION_TOKEN) else {
            tracing::debug!(
                target: LOG_TARGET,
                tokens = tokens.len(),
                "no pronunciation token, skipping enrichment"
            );
            return Ok(metrics);
        };

        match self
            .classifier
            .classify_with(rng, metrics.f0_mean, metrics.f0_std)
        {
            Ok(gm) => {
                metrics.gender = Some(gm.gender);
                metrics.mood = Some(gm.mood);
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, kind = ?e.kind(), error = %e, "gender/mood skipped")
            }
        }

        match probability_token.parse::<f64>() {
            Ok(p) => match self.scorer.score_with(rng, round3(p)) {
                Ok(score) => metrics.pron_score = Some(score),
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, kind = ?e.kind(), error = %e, "pronunciation score skipped")
                }
            },
            Err(_) => tracing::warn!(
                target: LOG_TARGET,
                token = %probability_token,
                "pronunciation token is not numeric"
            ),
        }

        Ok(metrics)
    }
}
