use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENGINE_BIN: &str = "praat";
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 120;
pub const ENV_DATASET_DIR: &str = "PROSODY_DATASET_DIR";
pub const ENV_ENGINE_BIN: &str = "PROSODY_ENGINE_BIN";
pub const ENV_ENGINE_TIMEOUT_SECS: &str = "PROSODY_ENGINE_TIMEOUT_SECS";

const BASIC_SCRIPT: &str = "essen/myspsolution.praat";
const COMPARATIVE_SCRIPT: &str = "essen/MLTRNL_fix.praat";
const REFERENCE_TABLE: &str = "essen/stats.csv";
const GRID_DIR: &str = "textgrid";
const TABLE_DIR: &str = "csv";
const AUDIO_DIR: &str = "audioFiles/temp";

/// Parameters handed to both analysis scripts on every engine run.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct RunConfiguration {
    silence_threshold_db: f64,
    min_dip_db: f64,
    min_pause_s: f64,
    min_pitch_hz: f64,
    max_pitch_hz: f64,
    time_step_s: f64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            silence_threshold_db: -20.0,
            min_dip_db: 2.0,
            min_pause_s: 0.3,
            min_pitch_hz: 80.0,
            max_pitch_hz: 400.0,
            time_step_s: 0.01,
        }
    }
}

impl RunConfiguration {
    pub fn with_silence_threshold(mut self, db: f64) -> Result<Self, ConfigError> {
        if !db.is_finite() {
            return Err(ConfigError::NonFinite("silence_threshold"));
        }
        self.silence_threshold_db = db;
        Ok(self)
    }

    pub fn with_min_dip(mut self, db: f64) -> Result<Self, ConfigError> {
        if !db.is_finite() {
            return Err(ConfigError::NonFinite("min_dip"));
        }
        self.min_dip_db = db;
        Ok(self)
    }

    pub fn with_min_pause(mut self, seconds: f64) -> Result<Self, ConfigError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(ConfigError::NonPositivePause(seconds));
        }
        self.min_pause_s = seconds;
        Ok(self)
    }

    pub fn with_pitch_range(mut self, min_hz: f64, max_hz: f64) -> Result<Self, ConfigError> {
        if !(min_hz.is_finite() && max_hz.is_finite()) {
            return Err(ConfigError::NonFinite("pitch_range"));
        }
        if min_hz >= max_hz {
            return Err(ConfigError::InvertedPitchRange { min_hz, max_hz });
        }
        self.min_pitch_hz = min_hz;
        self.max_pitch_hz = max_hz;
        Ok(self)
    }

    pub fn with_time_step(mut self, seconds: f64) -> Result<Self, ConfigError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(ConfigError::NonPositiveTimeStep(seconds));
        }
        self.time_step_s = seconds;
        Ok(self)
    }

    pub fn silence_threshold_db(&self) -> f64 {
        self.silence_threshold_db
    }

    pub fn min_dip_db(&self) -> f64 {
        self.min_dip_db
    }

    pub fn min_pause_s(&self) -> f64 {
        self.min_pause_s
    }

    pub fn min_pitch_hz(&self) -> f64 {
        self.min_pitch_hz
    }

    pub fn max_pitch_hz(&self) -> f64 {
        self.max_pitch_hz
    }

    pub fn time_step_s(&self) -> f64 {
        self.time_step_s
    }
}

/// Which analysis script the engine should run.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Basic,
    Comparative,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Comparative => "comparative",
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub audio: PathBuf,
    pub grids: PathBuf,
    pub tables: PathBuf,
}

impl WorkspacePaths {
    pub fn under(root: &Path) -> Self {
        Self {
            audio: root.join(AUDIO_DIR),
            grids: root.join(GRID_DIR),
            tables: root.join(TABLE_DIR),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.audio, &self.grids, &self.tables]
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalyzerConfig {
    pub dataset_dir: PathBuf,
    pub engine_bin: PathBuf,
    pub scripts: BTreeMap<ScriptKind, PathBuf>,
    pub reference_table: PathBuf,
    pub workspace: WorkspacePaths,
    pub run: RunConfiguration,
    pub engine_timeout: Duration,
}

impl AnalyzerConfig {
    /// Lays out scripts, reference table and scratch dirs under one dataset root.
    pub fn from_dataset_dir<P: Into<PathBuf>>(dataset_dir: P) -> Self {
        let dataset_dir = dataset_dir.into();
        let scripts = BTreeMap::from([
            (ScriptKind::Basic, dataset_dir.join(BASIC_SCRIPT)),
            (ScriptKind::Comparative, dataset_dir.join(COMPARATIVE_SCRIPT)),
        ]);
        Self {
            engine_bin: PathBuf::from(DEFAULT_ENGINE_BIN),
            scripts,
            reference_table: dataset_dir.join(REFERENCE_TABLE),
            workspace: WorkspacePaths::under(&dataset_dir),
            run: RunConfiguration::default(),
            engine_timeout: Duration::from_secs(DEFAULT_ENGINE_TIMEOUT_SECS),
            dataset_dir,
        }
    }

    /// Keeps scripts and reference data where they are but moves scratch output elsewhere.
    pub fn with_workspace_root(mut self, root: &Path) -> Self {
        self.workspace = WorkspacePaths::under(root);
        self
    }

    pub fn with_engine_bin<P: Into<PathBuf>>(mut self, bin: P) -> Self {
        self.engine_bin = bin.into();
        self
    }

    pub fn with_run(mut self, run: RunConfiguration) -> Self {
        self.run = run;
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.engine_timeout = timeout;
        Ok(self)
    }

    pub fn script(&self, kind: ScriptKind) -> Option<&Path> {
        self.scripts.get(&kind).map(PathBuf::as_path)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    #[error("min_pause must be > 0 s, got {0}")]
    NonPositivePause(f64),
    #[error("time_step must be > 0 s, got {0}")]
    NonPositiveTimeStep(f64),
    #[error("min_pitch ({min_hz} Hz) must be below max_pitch ({max_hz} Hz)")]
    InvertedPitchRange { min_hz: f64, max_hz: f64 },
    #[error("engine timeout must be > 0")]
    ZeroTimeout,
    #[error("invalid value for {key}: {value}")]
    InvalidEnvValue { key: String, value: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

pub fn resolve_timeout(
    cli_secs: Option<u64>,
    env_key: &str,
    env: &impl Env,
) -> Result<Duration, ConfigError> {
    let secs = match cli_secs {
        Some(v) => v,
        None => match env.var(env_key) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key: env_key.to_owned(),
                    value: raw.clone(),
                })?,
            None => DEFAULT_ENGINE_TIMEOUT_SECS,
        },
    };
    if secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }
    Ok(Duration::from_secs(secs))
}
