use anyhow::Context;
use clap::Parser;
use prosody_core::config::{
    resolve_optional_string, resolve_string_with_default, resolve_timeout, AnalyzerConfig,
    RunConfiguration, StdEnv, DEFAULT_ENGINE_BIN, ENV_DATASET_DIR, ENV_ENGINE_BIN,
    ENV_ENGINE_TIMEOUT_SECS,
};
use prosody_core::engine::PraatEngine;
use prosody_core::normalize::FfmpegAudioNormalizer;
use prosody_core::pipeline::ProsodyAnalyzer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prosody")]
#[command(about = "Speech prosody and pronunciation analysis of a single recording")]
struct Args {
    /// Recording to analyze (any format ffmpeg can read).
    audio: PathBuf,

    /// Root holding the analysis scripts and reference table.
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    #[arg(long)]
    engine_bin: Option<String>,

    #[arg(long)]
    engine_timeout_secs: Option<u64>,

    /// Put scratch dirs here instead of under the dataset dir.
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
    silence_threshold: f64,

    #[arg(long, default_value_t = 2.0)]
    min_dip: f64,

    #[arg(long, default_value_t = 0.3)]
    min_pause: f64,

    #[arg(long, default_value_t = 80.0)]
    min_pitch: f64,

    #[arg(long, default_value_t = 400.0)]
    max_pitch: f64,

    #[arg(long, default_value_t = 0.01)]
    time_step: f64,

    #[arg(long)]
    pretty: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let audio = args.audio.clone();
    let pretty = args.pretty;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        dataset_dir = %cfg.dataset_dir.display(),
        engine = %cfg.engine_bin.display(),
        timeout_secs = cfg.engine_timeout.as_secs(),
        "config loaded"
    );

    let engine = PraatEngine::new(cfg.engine_bin.clone());
    let analyzer = ProsodyAnalyzer::new(&cfg, FfmpegAudioNormalizer::default(), engine);
    let result = analyzer.analyze(&audio).await;
    analyzer.close();

    let json = if pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("failed to encode result")?;
    println!("{json}");

    if result.is_empty() {
        anyhow::bail!("analysis produced no results for {}", audio.display());
    }
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(
    args: Args,
    env: &impl prosody_core::config::Env,
) -> anyhow::Result<AnalyzerConfig> {
    let dataset_dir = resolve_optional_string(
        args.dataset_dir.map(|p| p.to_string_lossy().into_owned()),
        ENV_DATASET_DIR,
        env,
    )
    .with_context(|| format!("--dataset-dir or {ENV_DATASET_DIR} is required"))?;

    let engine_bin =
        resolve_string_with_default(args.engine_bin, ENV_ENGINE_BIN, env, DEFAULT_ENGINE_BIN);
    let timeout = resolve_timeout(args.engine_timeout_secs, ENV_ENGINE_TIMEOUT_SECS, env)?;

    let run = RunConfiguration::default()
        .with_silence_threshold(args.silence_threshold)?
        .with_min_dip(args.min_dip)?
        .with_min_pause(args.min_pause)?
        .with_pitch_range(args.min_pitch, args.max_pitch)?
        .with_time_step(args.time_step)?;

    let mut cfg = AnalyzerConfig::from_dataset_dir(dataset_dir)
        .with_engine_bin(engine_bin)
        .with_run(run)
        .with_engine_timeout(timeout)?;
    if let Some(root) = args.workspace_root.as_deref() {
        cfg = cfg.with_workspace_root(root);
    }
    Ok(cfg)
}
