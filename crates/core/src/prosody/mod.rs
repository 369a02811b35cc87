mod reference;

use crate::config::ScriptKind;
use crate::engine::{AcousticEngine, EngineError, EngineRunner};
use crate::error::AnalysisError;
use crate::metrics::{round3, tokens, ParseError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::{Path, PathBuf};

pub use reference::{ReferenceError, ReferenceRow, ReferenceTable};

const LOG_TARGET: &str = "prosody";

/// Positional fields of the comparative script's output.
pub const RAW_FIELDS: [&str; 27] = [
    "avepauseduratin",
    "avelongpause",
    "speakingtot",
    "avenumberofwords",
    "articulationrate",
    "inpro",
    "f1norm",
    "mr",
    "q25",
    "q50",
    "q75",
    "std",
    "fmax",
    "fmin",
    "vowelinx1",
    "vowelinx2",
    "formantmean",
    "formantstd",
    "nuofwrds",
    "npause",
    "ins",
    "fillerratio",
    "xx",
    "xxx",
    "totsco",
    "xxban",
    "speakingrate",
];

/// Raw fields the script emits for its own bookkeeping.
pub const DROPPED_FIELDS: [&str; 2] = ["xxx", "xxban"];

/// Display names for the raw fields left after dropping, in the same order.
pub const DISPLAY_NAMES: [&str; 25] = [
    "avg_pause_dur_per_syll",
    "n_long_pause",
    "speaking_time",
    "speaking_wpm",
    "articulation_rate",
    "total_wpm",
    "formants_index",
    "f0_index",
    "f0_25",
    "f0_50",
    "f0_75",
    "f0_std",
    "f0_max",
    "f0_min",
    "n_detected_vowel",
    "pct_correct_vowel",
    "f2_f1_mean",
    "f2_f1_std",
    "n_words",
    "n_pause",
    "intonation_index",
    "n_syllable/n_pause",
    "TOEFL_Score",
    "Shannon_Score",
    "speaking_rate",
];

/// Diagnostic fields kept out of the caller-facing comparison.
pub const HIDDEN_FIELDS: [&str; 10] = [
    "n_words",
    "n_pause",
    "n_long_pause",
    "speaking_time",
    "f0_25",
    "f0_50",
    "f0_75",
    "f0_std",
    "f0_max",
    "f0_min",
];

/// Rounded display fields in script order. Serializes as a JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProsodyComparison {
    fields: Vec<(&'static str, f64)>,
}

impl ProsodyComparison {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.fields.iter().copied()
    }
}

impl Serialize for ProsodyComparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Maps a 27-token comparative payload onto the visible display fields.
pub fn parse_comparison(raw: &str) -> Result<ProsodyComparison, ParseError> {
    let tokens = tokens(raw)?;
    if tokens.len() != RAW_FIELDS.len() {
        return Err(ParseError::TokenCount {
            expected: RAW_FIELDS.len(),
            got: tokens.len(),
        });
    }

    let kept = RAW_FIELDS
        .iter()
        .zip(&tokens)
        .filter(|(raw_name, _)| !DROPPED_FIELDS.contains(*raw_name))
        .map(|(_, token)| *token);

    let mut fields = Vec::with_capacity(DISPLAY_NAMES.len() - HIDDEN_FIELDS.len());
    for (name, token) in DISPLAY_NAMES.iter().zip(kept) {
        if HIDDEN_FIELDS.contains(name) {
            continue;
        }
        match token.parse::<f64>() {
            Ok(v) => fields.push((*name, round3(v))),
            Err(_) => {
                tracing::warn!(target: LOG_TARGET, field = name, token, "non-numeric field skipped")
            }
        }
    }
    Ok(ProsodyComparison { fields })
}

/// Runs the comparative script and reduces its output to [`ProsodyComparison`].
#[derive(Clone, Debug)]
pub struct ProsodyComparator {
    reference_table: PathBuf,
}

impl ProsodyComparator {
    pub fn new(reference_table: PathBuf) -> Self {
        Self { reference_table }
    }

    pub async fn compare<E: AcousticEngine>(
        &self,
        runner: &EngineRunner<E>,
        audio: &Path,
    ) -> Result<ProsodyComparison, AnalysisError> {
        let output = runner.run(audio, ScriptKind::Comparative).await?;
        let payload = output
            .payload()
            .ok_or(EngineError::TooFewObjects(output.objects.len()))?;
        tracing::debug!(target: LOG_TARGET, payload = %payload, "comparative payload");

        let comparison = parse_comparison(&payload)?;

        match ReferenceTable::load(&self.reference_table) {
            Ok(table) => {
                tracing::debug!(target: LOG_TARGET, rows = table.rows.len(), "reference table loaded")
            }
            Err(e) => tracing::warn!(
                target: LOG_TARGET,
                kind = ?e.kind(),
                error = %e,
                "reference table unavailable; comparison continues without it"
            ),
        }

        Ok(comparison)
    }
}
