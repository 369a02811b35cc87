use crate::metrics::ClassificationError;
use rand::Rng;
use rand_distr::{Binomial, Distribution};

const TRIALS: u64 = 10;
const SAMPLES: usize = 10_000;

/// Monte-Carlo estimate of a 0–100 pronunciation score from one probability.
///
/// Draws binomial(10, p) samples and scales their mean; repeated calls agree only
/// statistically.
#[derive(Clone, Copy, Debug)]
pub struct PronunciationScorer {
    samples: usize,
}

impl Default for PronunciationScorer {
    fn default() -> Self {
        Self { samples: SAMPLES }
    }
}

impl PronunciationScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: usize) -> Self {
        Self {
            samples: samples.max(1),
        }
    }

    pub fn score(&self, probability: f64) -> Result<f64, ClassificationError> {
        self.score_with(&mut rand::rng(), probability)
    }

    pub fn score_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        probability: f64,
    ) -> Result<f64, ClassificationError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ClassificationError::InvalidProbability(probability));
        }
        let dist = Binomial::new(TRIALS, probability).map_err(|e| {
            ClassificationError::Distribution {
                distribution: "binomial",
                details: e.to_string(),
            }
        })?;

        let total: u64 = (0..self.samples).map(|_| dist.sample(&mut *rng)).sum();
        let mean = total as f64 / self.samples as f64;
        Ok(mean * 100.0 / TRIALS as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const TOLERANCE: f64 = 3.0;

    #[test]
    fn certain_outcomes_are_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        let scorer = PronunciationScorer::new();
        assert_eq!(scorer.score_with(&mut rng, 0.0).unwrap(), 0.0);
        assert_eq!(scorer.score_with(&mut rng, 1.0).unwrap(), 100.0);
    }

    #[test]
    fn score_tracks_probability_within_tolerance() {
        let mut rng = StdRng::seed_from_u64(42);
        let scorer = PronunciationScorer::new();
        for p in [0.05, 0.25, 0.5, 0.731, 0.9] {
            let score = scorer.score_with(&mut rng, p).unwrap();
            assert!((0.0..=100.0).contains(&score), "p={p} score={score}");
            assert!(
                (score - p * 100.0).abs() <= TOLERANCE,
                "p={p} score={score}"
            );
        }
    }

    #[test]
    fn repeated_calls_agree_statistically() {
        let scorer = PronunciationScorer::new();
        let a = scorer.score(0.6).unwrap();
        let b = scorer.score(0.6).unwrap();
        assert!((a - b).abs() <= 2.0 * TOLERANCE);
    }

    #[test]
    fn more_samples_tighten_the_estimate() {
        let mut rng = StdRng::seed_from_u64(9);
        let fine = PronunciationScorer::with_samples(100_000)
            .score_with(&mut rng, 0.37)
            .unwrap();
        assert!((fine - 37.0).abs() < 1.0);
    }

    #[test]
    fn out_of_range_probability_fails() {
        let scorer = PronunciationScorer::new();
        for p in [-0.1, 1.01, f64::NAN] {
            assert!(matches!(
                scorer.score(p),
                Err(ClassificationError::InvalidProbability(_))
            ));
        }
    }
}
