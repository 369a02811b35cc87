use crate::normalize::{
    parse_f32le, peak_normalize, staged_path, write_wav, AudioNormalizer, NormalizeError, Result,
    WaveFormat, PEAK_HEADROOM_DB,
};
use ffmpeg_sidecar::{download, paths::ffmpeg_path};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "normalize::ffmpeg";

#[derive(Clone, Debug)]
pub struct FfmpegAudioNormalizer {
    output_format: WaveFormat,
}

impl Default for FfmpegAudioNormalizer {
    fn default() -> Self {
        Self {
            output_format: WaveFormat::analysis_mono_48khz(),
        }
    }
}

impl FfmpegAudioNormalizer {
    fn ensure_ffmpeg_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| NormalizeError::FfmpegUnavailable(e.to_string()))
    }

    async fn decode_with_ffmpeg(&self, input: &Path) -> Result<Vec<f32>> {
        let fmt = self.output_format;
        if fmt.channels != 1 {
            return Err(NormalizeError::InvalidPcm(
                "only mono output supported".to_owned(),
            ));
        }

        let output = tokio::process::Command::new(ffmpeg_path())
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-vn", "-sn", "-dn", "-ac", "1", "-ar"])
            .arg(fmt.sample_rate.to_string())
            .args(["-f", "f32le", "-acodec", "pcm_f32le", "pipe:1"])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| NormalizeError::FfmpegFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr_s = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(NormalizeError::FfmpegFailed(format!(
                "exit_code={:?} stderr={stderr_s}",
                output.status.code()
            )));
        }

        parse_f32le(&output.stdout)
    }
}

impl AudioNormalizer for FfmpegAudioNormalizer {
    fn normalize<'a>(
        &'a self,
        input: &'a Path,
        staging_dir: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        async move {
            if !input.is_file() {
                return Err(NormalizeError::InputNotFound(input.to_path_buf()));
            }
            self.ensure_ffmpeg_available()?;

            let mut samples = self.decode_with_ffmpeg(input).await?;
            peak_normalize(&mut samples, PEAK_HEADROOM_DB);

            let target = staged_path(input, staging_dir);
            write_wav(&target, self.output_format, &samples)?;
            tracing::debug!(
                target: LOG_TARGET,
                input = %input.display(),
                output = %target.display(),
                samples = samples.len(),
                "audio normalized"
            );
            Ok(target)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_is_reported_before_ffmpeg_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.mp3");
        let err = FfmpegAudioNormalizer::default()
            .normalize(&missing, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::InputNotFound(p) if p == missing));
    }
}
