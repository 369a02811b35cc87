use crate::{
    config::{AnalyzerConfig, ScriptKind},
    engine::{AcousticEngine, EngineError, EngineRunner},
    error::{AnalysisError, FailureKind},
    metrics::{BasicMetrics, BasicMetricsParser},
    normalize::AudioNormalizer,
    prosody::{ProsodyComparator, ProsodyComparison},
    workspace::TemporaryWorkspace,
};
use serde::Serialize;
use std::path::Path;

const LOG_TARGET: &str = "pipeline";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BranchStatus {
    Ok,
    Failed { kind: FailureKind, message: String },
}

impl BranchStatus {
    fn from_error(err: &AnalysisError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Ok => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AnalysisStatus {
    pub basic: BranchStatus,
    pub prosody: BranchStatus,
}

/// Outcome of one `analyze` call. Either slot may be absent; `status` says why.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalysisResult {
    pub basic: Option<BasicMetrics>,
    pub prosody: Option<ProsodyComparison>,
    pub status: AnalysisStatus,
}

impl AnalysisResult {
    fn from_branches(
        basic: Result<BasicMetrics, AnalysisError>,
        prosody: Result<ProsodyComparison, AnalysisError>,
    ) -> Self {
        let (basic, basic_status) = split_branch("basic", basic);
        let (prosody, prosody_status) = split_branch("prosody", prosody);
        Self {
            basic,
            prosody,
            status: AnalysisStatus {
                basic: basic_status,
                prosody: prosody_status,
            },
        }
    }

    fn failed(err: &AnalysisError) -> Self {
        tracing::warn!(target: LOG_TARGET, kind = ?err.kind(), error = %err, "analysis aborted before engine runs");
        Self {
            basic: None,
            prosody: None,
            status: AnalysisStatus {
                basic: BranchStatus::from_error(err),
                prosody: BranchStatus::from_error(err),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.basic.is_some() && self.prosody.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.basic.is_none() && self.prosody.is_none()
    }
}

fn split_branch<T>(
    branch: &'static str,
    outcome: Result<T, AnalysisError>,
) -> (Option<T>, BranchStatus) {
    match outcome {
        Ok(value) => (Some(value), BranchStatus::Ok),
        Err(e) => {
            tracing::warn!(target: LOG_TARGET, branch, kind = ?e.kind(), error = %e, "branch failed");
            (None, BranchStatus::from_error(&e))
        }
    }
}

/// Normalizes a recording, runs both analysis scripts and merges their results.
///
/// Scratch output lives in the configured workspace and is purged after every call,
/// on [`close`](Self::close) and on drop. One analysis at a time per instance.
pub struct ProsodyAnalyzer<N, E> {
    normalizer: N,
    runner: EngineRunner<E>,
    basic: BasicMetricsParser,
    comparator: ProsodyComparator,
    workspace: TemporaryWorkspace,
}

impl<N, E> ProsodyAnalyzer<N, E>
where
    N: AudioNormalizer,
    E: AcousticEngine,
{
    pub fn new(config: &AnalyzerConfig, normalizer: N, engine: E) -> Self {
        Self {
            normalizer,
            runner: EngineRunner::new(engine, config),
            basic: BasicMetricsParser::default(),
            comparator: ProsodyComparator::new(config.reference_table.clone()),
            workspace: TemporaryWorkspace::new(config.workspace.clone()),
        }
    }

    pub async fn analyze(&self, audio: &Path) -> AnalysisResult {
        let guard = match self.workspace.acquire() {
            Ok(guard) => guard,
            Err(e) => return AnalysisResult::failed(&AnalysisError::from(e)),
        };

        tracing::info!(target: LOG_TARGET, audio = %audio.display(), "analysis started");
        let normalized = match self.normalizer.normalize(audio, &guard.paths().audio).await {
            Ok(path) => path,
            Err(e) => return AnalysisResult::failed(&AnalysisError::from(e)),
        };

        let basic = self.basic_metrics(&normalized).await;
        let prosody = self.comparator.compare(&self.runner, &normalized).await;
        let result = AnalysisResult::from_branches(basic, prosody);

        drop(guard);
        tracing::info!(
            target: LOG_TARGET,
            basic = result.status.basic.is_ok(),
            prosody = result.status.prosody.is_ok(),
            "analysis finished"
        );
        result
    }

    async fn basic_metrics(&self, audio: &Path) -> Result<BasicMetrics, AnalysisError> {
        let output = self.runner.run(audio, ScriptKind::Basic).await?;
        let payload = output
            .payload()
            .ok_or(EngineError::TooFewObjects(output.objects.len()))?;
        tracing::debug!(target: LOG_TARGET, payload = %payload, "basic payload");
        Ok(self.basic.parse(&payload)?)
    }

    /// Purges the workspace and releases the analyzer.
    pub fn close(self) {
        self.workspace.purge();
    }
}

impl<N, E> Drop for ProsodyAnalyzer<N, E> {
    fn drop(&mut self) {
        self.workspace.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{fixture_config, StubEngine};
    use crate::metrics::Gender;
    use crate::normalize::{self, NormalizeError};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::path::PathBuf;

    const BASIC: &str = "myspsolution.praat";
    const COMPARATIVE: &str = "MLTRNL_fix.praat";
    const BASIC_PAYLOAD: &str =
        "90 12 4.1 5.3 17.2 22.8 75.4 131.27 24.3 128.9 82 211 113 147 0.82";

    /// Stages a placeholder file instead of transcoding.
    struct StubNormalizer;

    impl AudioNormalizer for StubNormalizer {
        fn normalize<'a>(
            &'a self,
            input: &'a Path,
            staging_dir: &'a Path,
        ) -> BoxFuture<'a, normalize::Result<PathBuf>> {
            async move {
                if !input.is_file() {
                    return Err(NormalizeError::InputNotFound(input.to_path_buf()));
                }
                let target = normalize::staged_path(input, staging_dir);
                std::fs::write(&target, b"RIFF").map_err(|e| NormalizeError::Write {
                    path: target.clone(),
                    details: e.to_string(),
                })?;
                Ok(target)
            }
            .boxed()
        }
    }

    fn comparative_payload(n: usize) -> String {
        (0..n)
            .map(|i| format!("{}.5", i + 1))
            .collect::<Vec<_>>()
            .join(" ")
    }

    struct Fixture {
        _root: tempfile::TempDir,
        config: AnalyzerConfig,
        input: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().expect("tempdir");
        let config = fixture_config(root.path());
        let input = root.path().join("speech.mp3");
        std::fs::write(&input, b"ID3").expect("input");
        Fixture {
            _root: root,
            config,
            input,
        }
    }

    fn assert_workspace_purged(config: &AnalyzerConfig) {
        for dir in config.workspace.all() {
            let residue = std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0);
            assert_eq!(residue, 0, "{} not purged", dir.display());
        }
    }

    #[tokio::test]
    async fn both_branches_succeed() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_payload(BASIC, BASIC_PAYLOAD)
            .with_payload(COMPARATIVE, &comparative_payload(27));
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let result = analyzer.analyze(&fx.input).await;
        assert!(result.is_complete());
        let basic = result.basic.as_ref().expect("basic");
        assert_eq!(basic.n_syllables, 90);
        assert_eq!(basic.gender, Some(Gender::Male));
        assert!(basic.pron_score.is_some());
        assert_eq!(result.prosody.as_ref().map(ProsodyComparison::len), Some(15));
        assert!(result.status.basic.is_ok() && result.status.prosody.is_ok());
        assert_workspace_purged(&fx.config);
    }

    #[tokio::test]
    async fn both_runs_see_the_normalized_audio() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_payload(BASIC, BASIC_PAYLOAD)
            .with_payload(COMPARATIVE, &comparative_payload(27));
        let requests = engine.requests.clone();
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);
        analyzer.analyze(&fx.input).await;

        let requests = requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        let staged = fx.config.workspace.audio.join("proc_speech.wav");
        assert!(requests.iter().all(|r| r.audio == staged));
        assert_eq!(
            requests[0].script,
            fx.config.script(ScriptKind::Basic).expect("basic").to_path_buf()
        );
    }

    #[tokio::test]
    async fn malformed_comparative_payload_keeps_basic() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_payload(BASIC, BASIC_PAYLOAD)
            .with_payload(COMPARATIVE, &comparative_payload(26));
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let result = analyzer.analyze(&fx.input).await;
        assert!(result.basic.is_some());
        assert!(result.prosody.is_none());
        assert!(result.status.basic.is_ok());
        assert_eq!(
            result.status.prosody.failure_kind(),
            Some(FailureKind::ParseFailure)
        );
        assert_workspace_purged(&fx.config);
    }

    #[tokio::test]
    async fn silent_recording_yields_zero_counts() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_payload(BASIC, "0 0 0 0 0 3 0 0 0 0 0 0 0 0 0")
            .with_payload(COMPARATIVE, &comparative_payload(27));
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let result = analyzer.analyze(&fx.input).await;
        let basic = result.basic.expect("basic");
        assert_eq!(basic.n_syllables, 0);
        assert_eq!(basic.n_pauses, 0);
        assert!(basic.pct_speaking.abs() < 1e-9);
    }

    #[tokio::test]
    async fn engine_failures_yield_empty_result_not_error() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_error(BASIC, "Script not completed")
            .with_error(COMPARATIVE, "Script not completed");
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let result = analyzer.analyze(&fx.input).await;
        assert!(result.is_empty());
        assert_eq!(
            result.status.basic.failure_kind(),
            Some(FailureKind::EngineInvocationFailure)
        );
        assert_workspace_purged(&fx.config);
    }

    #[tokio::test]
    async fn missing_input_fails_both_branches() {
        let fx = fixture();
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, StubEngine::default());

        let result = analyzer.analyze(&fx.input.with_extension("wav")).await;
        assert!(result.is_empty());
        assert_eq!(
            result.status.basic.failure_kind(),
            Some(FailureKind::InputNotFound)
        );
        assert_eq!(
            result.status.prosody.failure_kind(),
            Some(FailureKind::InputNotFound)
        );
        assert_workspace_purged(&fx.config);
    }

    #[tokio::test]
    async fn missing_comparative_script_only_fails_prosody() {
        let fx = fixture();
        std::fs::remove_file(fx.config.script(ScriptKind::Comparative).expect("script"))
            .expect("remove");
        let engine = StubEngine::default().with_payload(BASIC, BASIC_PAYLOAD);
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let result = analyzer.analyze(&fx.input).await;
        assert!(result.basic.is_some());
        assert_eq!(
            result.status.prosody.failure_kind(),
            Some(FailureKind::InputNotFound)
        );
    }

    #[test]
    fn drop_and_close_purge_the_workspace() {
        let fx = fixture();
        let seed = |cfg: &AnalyzerConfig| {
            for dir in cfg.workspace.all() {
                std::fs::create_dir_all(dir).expect("dir");
                std::fs::write(dir.join("stale"), b"x").expect("file");
            }
        };

        seed(&fx.config);
        drop(ProsodyAnalyzer::new(&fx.config, StubNormalizer, StubEngine::default()));
        assert_workspace_purged(&fx.config);

        seed(&fx.config);
        ProsodyAnalyzer::new(&fx.config, StubNormalizer, StubEngine::default()).close();
        assert_workspace_purged(&fx.config);
    }

    #[tokio::test]
    async fn result_serializes_with_named_slots_and_status() {
        let fx = fixture();
        let engine = StubEngine::default()
            .with_payload(BASIC, BASIC_PAYLOAD)
            .with_payload(COMPARATIVE, &comparative_payload(26));
        let analyzer = ProsodyAnalyzer::new(&fx.config, StubNormalizer, engine);

        let json = serde_json::to_value(analyzer.analyze(&fx.input).await).expect("json");
        assert_eq!(json["basic"]["n_pauses"], 12);
        assert!(json["prosody"].is_null());
        assert_eq!(json["status"]["basic"]["state"], "ok");
        assert_eq!(json["status"]["prosody"]["state"], "failed");
        assert_eq!(json["status"]["prosody"]["kind"], "parse_failure");
    }
}
