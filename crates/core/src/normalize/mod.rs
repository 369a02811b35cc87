#[cfg(feature = "ffmpeg-sidecar")]
mod ffmpeg;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "ffmpeg-sidecar")]
pub use ffmpeg::FfmpegAudioNormalizer;

/// Peak target after normalization, in dB below full scale.
pub const PEAK_HEADROOM_DB: f32 = 0.1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    /// What the analysis scripts expect: mono, 48 kHz, 24-bit.
    pub const fn analysis_mono_48khz() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            bits_per_sample: 24,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("audio file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),

    #[error("failed to write {path}: {details}")]
    Write { path: PathBuf, details: String },
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Converts arbitrary input audio into the canonical waveform the engine analyzes.
pub trait AudioNormalizer: Send + Sync {
    fn normalize<'a>(&'a self, input: &'a Path, staging_dir: &'a Path)
        -> BoxFuture<'a, Result<PathBuf>>;
}

/// `<staging>/proc_<stem>.wav`
pub fn staged_path(input: &Path, staging_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_owned());
    staging_dir.join(format!("proc_{stem}.wav"))
}

pub fn parse_f32le(raw: &[u8]) -> Result<Vec<f32>> {
    if !raw.len().is_multiple_of(4usize) {
        return Err(NormalizeError::InvalidPcm(format!(
            "f32le byte length must be multiple of 4, got {}",
            raw.len()
        )));
    }
    let mut out = Vec::with_capacity(raw.len() / 4);
    for chunk in raw.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

/// Scales so the loudest sample sits `headroom_db` below full scale. Silence is left alone.
pub fn peak_normalize(samples: &mut [f32], headroom_db: f32) {
    let peak = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let target = 10f32.powf(-headroom_db / 20.0);
    let gain = target / peak;
    for s in samples.iter_mut() {
        *s = if s.is_finite() { *s * gain } else { 0.0 };
    }
}

pub fn write_wav(path: &Path, format: WaveFormat, samples: &[f32]) -> Result<()> {
    let write_err = |e: hound::Error| NormalizeError::Write {
        path: path.to_path_buf(),
        details: e.to_string(),
    };
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };
    let max = ((1i64 << (format.bits_per_sample - 1)) - 1) as f32;
    let mut writer = hound::WavWriter::create(path, spec).map_err(write_err)?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * max).round() as i32;
        writer.write_sample(v).map_err(write_err)?;
    }
    writer.finalize().map_err(write_err)
}
