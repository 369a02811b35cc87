mod praat;

use crate::config::{AnalyzerConfig, RunConfiguration, ScriptKind};
use crate::workspace::remove_files_with_extension;
use futures::future::BoxFuture;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

pub use praat::PraatEngine;

const LOG_TARGET: &str = "engine";
const GRID_EXTENSION: &str = "TextGrid";

/// Index of the object whose string form carries the script's numeric output.
pub const PAYLOAD_INDEX: usize = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineRequest {
    pub script: PathBuf,
    pub run: RunConfiguration,
    pub audio: PathBuf,
    pub grid_dir: PathBuf,
}

/// One opaque object handed back by the engine.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub enum EngineObject {
    Sound(PathBuf),
    Info(String),
}

impl fmt::Display for EngineObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sound(path) => write!(f, "{}", path.display()),
            Self::Info(text) => f.write_str(text),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct EngineOutput {
    pub objects: Vec<EngineObject>,
}

impl EngineOutput {
    pub fn payload(&self) -> Option<String> {
        self.objects.get(PAYLOAD_INDEX).map(ToString::to_string)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("no script configured for kind {0}")]
    UnknownScript(&'static str),

    #[error("analysis script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("normalized audio not found: {0}")]
    AudioNotFound(PathBuf),

    #[error("failed to prepare grid dir {path}: {details}")]
    GridDir { path: PathBuf, details: String },

    #[error("failed to spawn engine at {path}: {details}")]
    Spawn { path: PathBuf, details: String },

    #[error("engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("engine returned {0} objects, expected at least 2")]
    TooFewObjects(usize),
}

impl EngineError {
    pub fn is_input_missing(&self) -> bool {
        matches!(self, Self::ScriptNotFound(_) | Self::AudioNotFound(_))
    }
}

/// The external acoustic-analysis engine.
pub trait AcousticEngine: Send + Sync {
    fn run(&self, request: EngineRequest) -> BoxFuture<'_, Result<EngineOutput, EngineError>>;
}

/// Resolves scripts, clears stale grid output and enforces the result contract around an engine.
pub struct EngineRunner<E> {
    engine: E,
    scripts: BTreeMap<ScriptKind, PathBuf>,
    run: RunConfiguration,
    grid_dir: PathBuf,
    timeout: Duration,
}

impl<E: AcousticEngine> EngineRunner<E> {
    pub fn new(engine: E, config: &AnalyzerConfig) -> Self {
        Self {
            engine,
            scripts: config.scripts.clone(),
            run: config.run,
            grid_dir: config.workspace.grids.clone(),
            timeout: config.engine_timeout,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn run(&self, audio: &Path, kind: ScriptKind) -> Result<EngineOutput, EngineError> {
        let script = self
            .scripts
            .get(&kind)
            .ok_or(EngineError::UnknownScript(kind.as_str()))?;
        if !script.is_file() {
            return Err(EngineError::ScriptNotFound(script.clone()));
        }
        if !audio.is_file() {
            return Err(EngineError::AudioNotFound(audio.to_path_buf()));
        }
        self.clear_stale_grids()?;

        tracing::debug!(
            target: LOG_TARGET,
            kind = kind.as_str(),
            script = %script.display(),
            audio = %audio.display(),
            "running engine"
        );

        let request = EngineRequest {
            script: script.clone(),
            run: self.run,
            audio: audio.to_path_buf(),
            grid_dir: self.grid_dir.clone(),
        };
        let output = tokio::time::timeout(self.timeout, self.engine.run(request))
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))??;

        if output.objects.len() < 2 {
            return Err(EngineError::TooFewObjects(output.objects.len()));
        }
        tracing::debug!(
            target: LOG_TARGET,
            kind = kind.as_str(),
            objects = output.objects.len(),
            "engine finished"
        );
        Ok(output)
    }

    fn clear_stale_grids(&self) -> Result<(), EngineError> {
        let grid_err = |e: std::io::Error| EngineError::GridDir {
            path: self.grid_dir.clone(),
            details: e.to_string(),
        };
        std::fs::create_dir_all(&self.grid_dir).map_err(grid_err)?;
        let removed = remove_files_with_extension(&self.grid_dir, GRID_EXTENSION).map_err(grid_err)?;
        if removed > 0 {
            tracing::debug!(target: LOG_TARGET, removed, "cleared stale grid files");
        }
        Ok(())
    }
}
