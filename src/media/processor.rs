use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    parse_probe_duration, BurnRequest, MediaCommand, MediaCommandBuilder, MediaProcessorTrait,
};
use crate::config::MediaConfig;
use crate::error::{DualsubError, Result};
use crate::progress::{EventSink, FfmpegLogParser, ProgressTracker, Stage};

/// Diagnostic lines kept for the error message of a failed run
const STDERR_TAIL_LINES: usize = 8;

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn burn_subtitles(
        &self,
        request: BurnRequest<'_>,
        stage: Stage,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let output_path = request.output_path();
        info!(
            "Burning {} into {} -> {}",
            request.subtitles.display(),
            request.video.display(),
            output_path.display()
        );
        events.log(format!("Adding subtitles to video: {}", display_name(&output_path)));

        let command = self.command_builder.burn_subtitles(&request, &self.config.extra_options);
        run_with_progress(&command, &output_path, stage, events, cancel).await?;

        events.log(format!("Subtitles added: {}", output_path.display()));
        Ok(output_path)
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let command = self.command_builder.extract_audio(video_path, audio_path);
        if let Err(e) = command.execute().await {
            remove_partial_output(audio_path).await;
            return Err(e);
        }

        info!("Audio extraction completed");
        Ok(())
    }

    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let stdout = self.command_builder.probe_duration(media_path).execute().await?;
        let duration = parse_probe_duration(&stdout)?;
        debug!("Probed duration of {}: {:.3}s", media_path.display(), duration);
        Ok(duration)
    }

    async fn check_availability(&self) -> Result<()> {
        let stdout = self.command_builder.version_check().execute().await?;
        info!(
            "Media processor is available: {}",
            stdout.lines().next().unwrap_or("unknown version")
        );
        Ok(())
    }
}

/// Run an ffmpeg command, turning its diagnostic stream into progress events.
///
/// ffmpeg rewrites its status line with `\r`, so stderr is framed on both
/// `\r` and `\n`. On cancellation the child is killed; on cancellation or a
/// non-zero exit `output_path` is deleted.
pub async fn run_with_progress(
    command: &MediaCommand,
    output_path: &Path,
    stage: Stage,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<()> {
    debug!("Executing media processing command: {} {:?}", command.binary_path, command.args);

    let mut child = command
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            DualsubError::Muxing(format!("Failed to execute {}: {}", command.binary_path, e))
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DualsubError::Muxing("ffmpeg stderr was not captured".to_string()))?;
    let mut lines = FramedRead::new(stderr, AnyDelimiterCodec::new(b"\r\n".to_vec(), Vec::new()));

    let mut parser = FfmpegLogParser::new();
    let mut tracker = ProgressTracker::new(stage, 100.0);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("{} cancelled, stopping {}", command.description, command.binary_path);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", command.binary_path, e);
                }
                remove_partial_output(output_path).await;
                return Err(DualsubError::Cancelled(command.description.clone()));
            }
            frame = lines.next() => {
                let Some(frame) = frame else { break };
                let bytes = frame.map_err(|e| {
                    DualsubError::Muxing(format!("Failed to read ffmpeg output: {}", e))
                })?;
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!("ffmpeg: {}", line);

                if let Some(percent) = parser.observe_line(line) {
                    tracker.report(percent, events);
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        remove_partial_output(output_path).await;
        let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
        return Err(DualsubError::Muxing(format!(
            "{} failed ({}): {}",
            command.description, status, detail
        )));
    }

    Ok(())
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
