//! dualsub - bilingual subtitle pipeline
//!
//! Transcribes videos into word-timed subtitles, translates them with a
//! local LLM and burns both languages back into the video with ffmpeg.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dualsub::cli::{Args, Commands};
use dualsub::config::{Config, DEFAULT_CONFIG_FILE};
use dualsub::display::EventRenderer;
use dualsub::error::DualsubError;
use dualsub::lookup::{list_videos, resolve_video};
use dualsub::progress::EventSink;
use dualsub::segment::segment;
use dualsub::subtitle::write_srt;
use dualsub::transcribe::{last_word_end, load_words};
use dualsub::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting dualsub");

    if let Commands::InitConfig { output, force } = &args.command {
        return init_config(output, *force);
    }

    let mut config = load_config(args.config.as_deref())?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after cleanup");
            interrupt.cancel();
        }
    });

    let (events, receiver) = EventSink::channel();
    let renderer = tokio::spawn(EventRenderer::new().run(receiver));

    let outcome = run(args.command, &mut config, events, cancel).await;

    // All senders are gone once `run` returns, so the renderer drains and exits
    renderer.await?;
    outcome?;

    info!("dualsub completed successfully");
    Ok(())
}

async fn run(
    command: Commands,
    config: &mut Config,
    events: EventSink,
    cancel: CancellationToken,
) -> Result<()> {
    match command {
        Commands::Segment { input, output, duration } => {
            info!("Segmenting word stream: {}", input.display());
            let mapped = load_words(&input).await?;
            let total = duration.unwrap_or_else(|| last_word_end(&mapped.words));
            let cues = segment(mapped.words, total, &config.segmenter, &events);
            write_srt(&output, &cues).await?;
            println!("Wrote {} cues to {}", cues.len(), output.display());
        }
        Commands::Transcribe { input, language } => {
            if language.is_some() {
                config.transcriber.language = language;
            }
            let video = resolve_video(&input, &config.paths.video_dir)?;
            let workflow = Workflow::new(config.clone(), events, cancel)?;
            workflow.check_dependencies(true, false).await?;
            let output = workflow.transcribe_file(&video).await?;
            println!("Transcript written to {}", output.display());
        }
        Commands::Translate { input, target } => {
            if let Some(target) = target {
                config.fuse.target_language = target;
            }
            let video = resolve_video(&input, &config.paths.video_dir)?;
            let workflow = Workflow::new(config.clone(), events, cancel)?;
            workflow.check_dependencies(false, true).await?;
            let output = workflow.translate_file(&video).await?;
            println!("Bilingual subtitles written to {}", output.display());
        }
        Commands::Split { input } => {
            let video = resolve_video(&input, &config.paths.video_dir)?;
            let workflow = Workflow::new(config.clone(), events, cancel)?;
            let (first, second) = workflow.split_file(&video).await?;
            println!("Tracks written to {} and {}", first.display(), second.display());
        }
        Commands::Fuse { input, keep_intermediate } => {
            config.fuse.keep_intermediate |= keep_intermediate;
            let video = resolve_video(&input, &config.paths.video_dir)?;
            let workflow = Workflow::new(config.clone(), events, cancel)?;
            workflow.check_dependencies(true, false).await?;
            let output = workflow.fuse_file(&video).await?;
            println!("Subtitled video written to {}", output.display());
        }
        Commands::Process { input, target } => {
            if let Some(target) = target {
                config.fuse.target_language = target;
            }
            let video = resolve_video(&input, &config.paths.video_dir)?;
            let workflow = Workflow::new(config.clone(), events, cancel)?;
            workflow.check_dependencies(true, true).await?;
            let output = workflow.process_file(&video).await?;
            println!("Subtitled video written to {}", output.display());
        }
        Commands::Batch { input_dir, skip_transcribe } => {
            if let Some(dir) = input_dir {
                config.paths.video_dir = dir;
            }
            let videos = list_videos(&config.paths.video_dir)?;
            if videos.is_empty() {
                println!("No video files in {}", config.paths.video_dir.display());
                return Ok(());
            }

            let workflow = Workflow::new(config.clone(), events, cancel)?;
            workflow.check_dependencies(true, true).await?;
            let report = workflow.batch(videos, !skip_transcribe).await;

            for (name, stage) in [
                ("transcribe", &report.transcribe),
                ("translate", &report.translate),
                ("fuse", &report.fuse),
            ] {
                println!(
                    "{:<10} {} succeeded, {} failed, {} skipped",
                    name,
                    stage.succeeded(),
                    stage.failed(),
                    stage.skipped()
                );
            }
            if !report.all_succeeded() {
                anyhow::bail!("some videos were not fully processed");
            }
        }
        Commands::InitConfig { output, force } => init_config(&output, force)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(DualsubError::Config(format!(
            "{} already exists, pass --force to overwrite",
            output.display()
        ))
        .into());
    }
    Config::default().save_to_file(output)?;
    println!("Default configuration written to {}", output.display());
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".dualsub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "dualsub.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("dualsub.log").display()
    );

    Ok(())
}
