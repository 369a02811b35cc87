use crate::engine::{AcousticEngine, EngineError, EngineObject, EngineOutput, EngineRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;

const LOG_TARGET: &str = "engine::praat";

/// Runs analysis scripts through the Praat command line (`praat --run`).
///
/// The script's info output (stdout) becomes the payload object at index 1, after a
/// `Sound` object naming the analyzed file. Blank stdout yields a single object.
#[derive(Clone, Debug)]
pub struct PraatEngine {
    binary: PathBuf,
}

impl PraatEngine {
    #[must_use]
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn script_args(request: &EngineRequest) -> Vec<OsString> {
        let run = &request.run;
        vec![
            "--run".into(),
            request.script.clone().into_os_string(),
            run.silence_threshold_db().to_string().into(),
            run.min_dip_db().to_string().into(),
            run.min_pause_s().to_string().into(),
            "yes".into(),
            request.audio.clone().into_os_string(),
            request.grid_dir.clone().into_os_string(),
            run.min_pitch_hz().to_string().into(),
            run.max_pitch_hz().to_string().into(),
            run.time_step_s().to_string().into(),
        ]
    }
}

impl AcousticEngine for PraatEngine {
    fn run(&self, request: EngineRequest) -> BoxFuture<'_, Result<EngineOutput, EngineError>> {
        let binary = self.binary.clone();

        async move {
            let child = Command::new(&binary)
                .args(Self::script_args(&request))
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| EngineError::Spawn {
                    path: binary.clone(),
                    details: e.to_string(),
                })?;

            let output = child.wait_with_output().await.map_err(|e| EngineError::Failed {
                status: "unknown".to_owned(),
                stderr: format!("wait failed: {e}"),
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
                return Err(EngineError::Failed {
                    status: output.status.to_string(),
                    stderr,
                });
            }

            let info = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            tracing::trace!(target: LOG_TARGET, bytes = info.len(), "captured script output");

            let mut objects = vec![EngineObject::Sound(request.audio)];
            if !info.is_empty() {
                objects.push(EngineObject::Info(info));
            }
            Ok(EngineOutput { objects })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfiguration;
    use std::path::Path;

    fn request(root: &Path) -> EngineRequest {
        EngineRequest {
            script: root.join("basic.praat"),
            run: RunConfiguration::default(),
            audio: root.join("proc_a.wav"),
            grid_dir: root.join("textgrid"),
        }
    }

    #[test]
    fn script_args_follow_engine_parameter_order() {
        let req = request(Path::new("/ws"));
        let args: Vec<String> = PraatEngine::script_args(&req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--run",
                "/ws/basic.praat",
                "-20",
                "2",
                "0.3",
                "yes",
                "/ws/proc_a.wav",
                "/ws/textgrid",
                "80",
                "400",
                "0.01",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let engine = PraatEngine::new(root.path().join("no-such-praat"));
        let err = engine.run(request(root.path())).await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn fake_engine(root: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = root.join("fake-praat.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_payload_object() {
        let root = tempfile::tempdir().expect("tempdir");
        let bin = fake_engine(root.path(), "echo \"12 3 4.5\"");
        let out = PraatEngine::new(bin)
            .run(request(root.path()))
            .await
            .expect("run");
        assert_eq!(out.objects.len(), 2);
        assert_eq!(out.payload().as_deref(), Some("12 3 4.5"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blank_stdout_yields_single_object() {
        let root = tempfile::tempdir().expect("tempdir");
        let bin = fake_engine(root.path(), "exit 0");
        let out = PraatEngine::new(bin)
            .run(request(root.path()))
            .await
            .expect("run");
        assert_eq!(out.objects.len(), 1);
        assert_eq!(out.payload(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let root = tempfile::tempdir().expect("tempdir");
        let bin = fake_engine(root.path(), "echo 'Script not completed' >&2\nexit 1");
        let err = PraatEngine::new(bin)
            .run(request(root.path()))
            .await
            .unwrap_err();
        match err {
            EngineError::Failed { stderr, .. } => assert!(stderr.contains("Script not completed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
