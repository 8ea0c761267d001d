use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DualsubError, Result};
use crate::segment::Word;

/// Words of one media file plus what the pipeline needs to segment them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTranscript {
    pub words: Vec<Word>,
    /// Media duration in seconds, used as the progress denominator
    pub duration: f64,
    pub language: Option<String>,
}

/// Service output reduced to words and detected language
#[derive(Debug, Clone, PartialEq)]
pub struct MappedWords {
    pub words: Vec<Word>,
    pub language: Option<String>,
}

/// Trait for converting service-specific transcription formats to words
pub trait TranscriptionMapper<T> {
    fn to_words(service_result: T) -> Result<MappedWords>;
}

/// End of the last word, or zero when there are no words
pub fn last_word_end(words: &[Word]) -> f64 {
    words.last().map(|w| w.end).unwrap_or(0.0)
}

/// Pick the probed duration, falling back to the end of the last word.
pub fn resolve_duration(probed: Result<f64>, words: &[Word]) -> f64 {
    let fallback = last_word_end(words);
    match probed {
        Ok(duration) => duration,
        Err(e) => {
            warn!("Duration probe failed ({}), using last word end {:.3}s", e, fallback);
            fallback
        }
    }
}

/// Parse a JSON transcription file into a service-specific structure
pub async fn read_json_output<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        DualsubError::Transcription(format!(
            "Failed to read transcription output {}: {}",
            path.display(),
            e
        ))
    })?;
    debug!(
        "JSON content first 500 chars: {}",
        content.chars().take(500).collect::<String>()
    );
    serde_json::from_str(&content).map_err(|e| {
        DualsubError::Transcription(format!("Failed to parse transcription JSON: {}", e))
    })
}

/// Run a transcriber process to completion, killing it on cancellation.
pub async fn run_transcriber(
    mut cmd: Command,
    binary: &str,
    cancel: &CancellationToken,
) -> Result<Output> {
    cmd.kill_on_drop(true).stdin(std::process::Stdio::null());
    debug!("Executing transcriber command: {:?}", cmd);

    let run = cmd.output();
    let output = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(DualsubError::Cancelled(format!("{} transcription", binary)));
        }
        output = run => output.map_err(|e| {
            DualsubError::Transcription(format!("Failed to execute {}: {}", binary, e))
        })?,
    };

    debug!("Transcriber exit status: {}", output.status);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DualsubError::Transcription(format!(
            "{} failed ({}): {}",
            binary,
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

/// Path of the JSON file a transcriber writes for `input` into `output_dir`
pub fn json_output_path(output_dir: &Path, input: &Path) -> Result<PathBuf> {
    let stem = input.file_stem().ok_or_else(|| {
        DualsubError::Transcription(format!("Invalid input filename: {}", input.display()))
    })?;
    Ok(output_dir.join(format!("{}.json", stem.to_string_lossy())))
}
