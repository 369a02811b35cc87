use crate::metrics::{stats, ClassificationError};
use rand::Rng;
use rand_distr::{Distribution, InverseGaussian, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;

const LOG_TARGET: &str = "metrics::gender";
const CHECK_SAMPLES: usize = 1000;
const WALD_SHAPE: f64 = 1.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mood {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "reading")]
    Reading,
    #[serde(rename = "passionate")]
    Passionate,
    Unknown,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unknown => "Unknown",
        })
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Reading => "reading",
            Self::Passionate => "passionate",
            Self::Unknown => "Unknown",
        })
    }
}

/// F0-mean range `(lower, upper]` bound to a label pair and two reference constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenderMoodBucket {
    pub lower: f64,
    pub upper: f64,
    pub gender: Gender,
    pub mood: Mood,
    pub reference: (f64, f64),
}

impl GenderMoodBucket {
    pub fn contains(&self, f0_mean: f64) -> bool {
        self.lower < f0_mean && f0_mean <= self.upper
    }
}

const fn bucket(
    lower: f64,
    upper: f64,
    gender: Gender,
    mood: Mood,
    g: f64,
    j: f64,
) -> GenderMoodBucket {
    GenderMoodBucket {
        lower,
        upper,
        gender,
        mood,
        reference: (g, j),
    }
}

/// Ascending and contiguous over `(0, inf)`.
pub const BUCKETS: [GenderMoodBucket; 6] = [
    bucket(0.0, 114.0, Gender::Male, Mood::Normal, 101.0, 3.4),
    bucket(114.0, 135.0, Gender::Male, Mood::Reading, 128.0, 4.35),
    bucket(135.0, 163.0, Gender::Male, Mood::Passionate, 142.0, 4.85),
    bucket(163.0, 197.0, Gender::Female, Mood::Normal, 182.0, 2.7),
    bucket(197.0, 226.0, Gender::Female, Mood::Reading, 213.0, 4.5),
    bucket(226.0, f64::INFINITY, Gender::Female, Mood::Passionate, 239.0, 5.3),
];

/// Statistics from the synthetic-sample comparison. Informational only; never changes the label.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct BucketCheck {
    pub ks_statistic: Option<f64>,
    pub t_statistic: Option<f64>,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct GenderMood {
    pub gender: Gender,
    pub mood: Mood,
    #[serde(skip)]
    pub check: Option<BucketCheck>,
}

impl GenderMood {
    pub const UNKNOWN: Self = Self {
        gender: Gender::Unknown,
        mood: Mood::Unknown,
        check: None,
    };
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GenderMoodClassifier;

impl GenderMoodClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn bucket_for(f0_mean: f64) -> Option<&'static GenderMoodBucket> {
        BUCKETS.iter().find(|b| b.contains(f0_mean))
    }

    pub fn classify(&self, f0_mean: f64, f0_std: f64) -> Result<GenderMood, ClassificationError> {
        self.classify_with(&mut rand::rng(), f0_mean, f0_std)
    }

    pub fn classify_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        f0_mean: f64,
        f0_std: f64,
    ) -> Result<GenderMood, ClassificationError> {
        let Some(bucket) = Self::bucket_for(f0_mean) else {
            tracing::debug!(target: LOG_TARGET, f0_mean, "no bucket matched");
            return Ok(GenderMood::UNKNOWN);
        };

        let check = bucket_check(rng, bucket, f0_mean, f0_std)?;
        tracing::trace!(
            target: LOG_TARGET,
            gender = %bucket.gender,
            mood = %bucket.mood,
            ks = ?check.ks_statistic,
            t = ?check.t_statistic,
            "bucket check"
        );

        Ok(GenderMood {
            gender: bucket.gender,
            mood: bucket.mood,
            check: Some(check),
        })
    }
}

fn bucket_check<R: Rng + ?Sized>(
    rng: &mut R,
    bucket: &GenderMoodBucket,
    f0_mean: f64,
    f0_std: f64,
) -> Result<BucketCheck, ClassificationError> {
    let (g, j) = bucket.reference;
    // rand_distr only rejects non-finite std devs; negative and NaN scales are ours to refuse.
    for (name, scale) in [("f0_mean", f0_mean), ("f0_std", f0_std)] {
        if scale.is_nan() || scale < 0.0 {
            return Err(ClassificationError::Distribution {
                distribution: "normal",
                details: format!("{name} must be a non-negative scale, got {scale}"),
            });
        }
    }
    let wald = |mean: f64| {
        InverseGaussian::new(mean, WALD_SHAPE).map_err(|e| ClassificationError::Distribution {
            distribution: "wald",
            details: e.to_string(),
        })
    };
    let normal = |mean: f64, std_dev: f64| {
        Normal::new(mean, std_dev).map_err(|e| ClassificationError::Distribution {
            distribution: "normal",
            details: e.to_string(),
        })
    };

    let d1 = draw(rng, &wald(g)?);
    let d2 = draw(rng, &wald(j)?);
    let c1 = draw(rng, &normal(g, f0_mean)?);
    let c2 = draw(rng, &normal(j, f0_std)?);

    Ok(BucketCheck {
        ks_statistic: stats::ks_statistic(&d1, &d2),
        t_statistic: stats::t_statistic(&c1, &c2),
    })
}

fn draw<R: Rng + ?Sized, D: Distribution<f64>>(rng: &mut R, dist: &D) -> Vec<f64> {
    (0..CHECK_SAMPLES).map(|_| dist.sample(&mut *rng)).collect()
}
