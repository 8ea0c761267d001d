// OpenAI Whisper Python implementation
// This provides support for OpenAI's Whisper command-line tool with word timestamps

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::common::{
    json_output_path, read_json_output, resolve_duration, run_transcriber, MappedWords,
    TranscriptionMapper, WordTranscript,
};
use super::TranscriberTrait;
use crate::config::TranscriberConfig;
use crate::error::{DualsubError, Result};
use crate::media::MediaProcessorTrait;
use crate::segment::Word;

/// OpenAI Whisper specific JSON output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperOutput {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<OpenAIWhisperSegment>,
    pub language: Option<String>,
}

/// OpenAI Whisper specific segment format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperSegment {
    pub start: f64,
    pub end: f64,
    /// Present only when run with `--word_timestamps True`
    #[serde(default)]
    pub words: Vec<OpenAIWhisperWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub probability: Option<f64>,
}

/// Mapper for OpenAI Whisper format to words
pub struct OpenAIWhisperMapper;

impl TranscriptionMapper<OpenAIWhisperOutput> for OpenAIWhisperMapper {
    fn to_words(whisper_output: OpenAIWhisperOutput) -> Result<MappedWords> {
        let segments = &whisper_output.segments;
        if !segments.is_empty() && segments.iter().all(|s| s.words.is_empty()) {
            return Err(DualsubError::Transcription(
                "Whisper output has no word timestamps (run with --word_timestamps True)"
                    .to_string(),
            ));
        }

        let words = whisper_output
            .segments
            .into_iter()
            .flat_map(|seg| seg.words)
            .map(|w| Word::new(w.word, w.start, w.end.max(w.start)))
            .collect();

        Ok(MappedWords {
            words,
            language: whisper_output.language,
        })
    }
}

/// OpenAI Whisper implementation
pub struct OpenAITranscriber {
    config: TranscriberConfig,
    media: Arc<dyn MediaProcessorTrait>,
}

impl OpenAITranscriber {
    pub fn new(config: TranscriberConfig, media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { config, media }
    }

    fn build_command(&self, media_path: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(media_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--word_timestamps")
            .arg("True");

        // Add language if specified
        if let Some(lang) = &self.config.language {
            cmd.arg("--language").arg(lang);
        }
        cmd
    }
}

#[async_trait]
impl TranscriberTrait for OpenAITranscriber {
    async fn transcribe(
        &self,
        media_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<WordTranscript> {
        info!(
            "Transcribing {} with OpenAI Whisper (model {})",
            media_path.display(),
            self.config.model
        );

        // Create temporary output directory for whisper results
        let temp_dir = tempfile::tempdir().map_err(|e| {
            DualsubError::Transcription(format!("Failed to create temp directory: {}", e))
        })?;

        let cmd = self.build_command(media_path, temp_dir.path());
        let output = run_transcriber(cmd, &self.config.binary_path, cancel).await?;
        debug!("Whisper stdout: {}", String::from_utf8_lossy(&output.stdout));

        let json_file = json_output_path(temp_dir.path(), media_path)?;
        if !json_file.exists() {
            return Err(DualsubError::Transcription(
                "Whisper JSON output file not found".to_string(),
            ));
        }

        let openai_output: OpenAIWhisperOutput = read_json_output(&json_file).await?;
        let mapped = OpenAIWhisperMapper::to_words(openai_output)?;
        if mapped.words.is_empty() {
            warn!("Whisper found no speech in {}", media_path.display());
        }
        let duration = resolve_duration(self.media.probe_duration(media_path).await, &mapped.words);

        Ok(WordTranscript {
            words: mapped.words,
            duration,
            language: mapped.language.or_else(|| self.config.language.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "text": " Hello, world. Bye.",
        "segments": [
            {"id": 0, "seek": 0, "start": 0.0, "end": 1.0, "text": " Hello, world.",
             "words": [
                {"word": " Hello,", "start": 0.0, "end": 0.5, "probability": 0.93},
                {"word": " world.", "start": 0.5, "end": 1.0, "probability": 0.97}
             ]},
            {"id": 1, "seek": 0, "start": 2.0, "end": 2.4, "text": " Bye.",
             "words": [{"word": " Bye.", "start": 2.0, "end": 2.4, "probability": 0.8}]}
        ],
        "language": "en"
    }"#;

    #[test]
    fn test_flattens_segment_words() {
        let output: OpenAIWhisperOutput = serde_json::from_str(SAMPLE).unwrap();
        let mapped = OpenAIWhisperMapper::to_words(output).unwrap();
        assert_eq!(
            mapped.words,
            vec![
                Word::new(" Hello,", 0.0, 0.5),
                Word::new(" world.", 0.5, 1.0),
                Word::new(" Bye.", 2.0, 2.4),
            ]
        );
        assert_eq!(mapped.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_rejects_output_without_word_timestamps() {
        let json = r#"{"text": "hi", "language": "en",
            "segments": [{"start": 0.0, "end": 1.0, "text": "hi"}]}"#;
        let output: OpenAIWhisperOutput = serde_json::from_str(json).unwrap();
        assert!(matches!(
            OpenAIWhisperMapper::to_words(output),
            Err(DualsubError::Transcription(_))
        ));
    }

    #[test]
    fn test_empty_transcript_is_valid() {
        let output: OpenAIWhisperOutput =
            serde_json::from_str(r#"{"text": "", "segments": [], "language": "en"}"#).unwrap();
        assert!(OpenAIWhisperMapper::to_words(output).unwrap().words.is_empty());
    }
}
