use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use normalizer::{
    actions, discard, scan, BatchScheduler, FfmpegTranscoder, FfprobeProbe, FilePipeline, NormalizerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Normalize a video library to HEVC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory scanned for source media
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for conforming files and finished transcodes
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for sources whose output already exists
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Move discarded outputs here instead of the OS trash
    #[arg(long)]
    discard_dir: Option<PathBuf>,

    /// Number of files processed at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show what would happen without moving, discarding or encoding anything
    #[arg(long)]
    dry_run: bool,

    /// Write the batch summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let mut cfg = NormalizerConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(input) = args.input {
        cfg.input_root = input;
    }
    if let Some(output) = args.output {
        cfg.output_root = output;
    }
    if let Some(archive) = args.archive {
        cfg.archive_root = archive;
    }
    if let Some(dir) = args.discard_dir {
        cfg.discard_dir = Some(dir);
    }
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }
    cfg.validate().context("Invalid configuration")?;

    info!("HEVC normalizer starting");
    info!("  Input root: {}", cfg.input_root.display());
    info!("  Output root: {}", cfg.output_root.display());
    info!("  Archive root: {}", cfg.archive_root.display());
    match &cfg.discard_dir {
        Some(dir) => info!("  Discard dir: {}", dir.display()),
        None => info!("  Discard dir: OS trash"),
    }
    info!("  Workers: {}", cfg.workers);
    info!("  Target codec: {}", cfg.target_codec);
    if args.dry_run {
        warn!("Dry run: nothing will be moved, discarded or encoded");
    }

    // an unreadable input root aborts before anything is touched
    let sources = scan::list_sources(&cfg).context("Failed to scan input root")?;
    if !args.dry_run {
        actions::prepare_roots(&cfg)?;
    }

    let cfg = Arc::new(cfg);
    let pipeline = FilePipeline::new(
        cfg.clone(),
        Arc::new(FfprobeProbe::new(cfg.ffprobe_bin.clone())),
        Arc::new(FfmpegTranscoder::from_config(&cfg)),
        discard::from_config(&cfg),
    )
    .dry_run(args.dry_run);

    let summary = BatchScheduler::new(pipeline, cfg.workers).run(sources).await;

    for problem in summary.problems() {
        error!("Needs attention: {} ({:?})", problem.source.display(), problem.status);
    }

    if let Some(path) = args.summary_json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    info!("Done");
    Ok(())
}
