// Modular transcription architecture
//
// Each implementation turns a media file into an ordered word stream:
// - WhisperCpp: whisper.cpp (`whisper-cli`), one JSON segment per word
// - OpenAI: OpenAI Whisper Python command line with word timestamps
//
// To add a new transcription service:
// 1. Create service-specific data structures for parsing its JSON
// 2. Implement TranscriptionMapper for your service
// 3. Add the service to TranscriberImplementation
// 4. Update the factory to create your implementation

pub mod common;
pub mod openai;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use common::*;
use crate::config::{TranscriberConfig, TranscriberImplementation};
use crate::error::{DualsubError, Result};
use crate::media::MediaProcessorTrait;
use crate::segment::Word;

/// Main trait for transcription operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Transcribe a media file into timed words
    async fn transcribe(
        &self,
        media_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<WordTranscript>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the transcriber selected by `config.implementation`
    pub fn create_transcriber(
        config: TranscriberConfig,
        media: Arc<dyn MediaProcessorTrait>,
    ) -> Box<dyn TranscriberTrait> {
        match config.implementation {
            TranscriberImplementation::WhisperCpp => {
                Box::new(whisper_cpp::WhisperCppTranscriber::new(config, media))
            }
            TranscriberImplementation::OpenAI => {
                Box::new(openai::OpenAITranscriber::new(config, media))
            }
        }
    }
}

/// Load a word stream saved by either transcriber, or a plain JSON array of
/// `{text, start, end}` words.
pub async fn load_words(path: &Path) -> Result<common::MappedWords> {
    if !path.exists() {
        return Err(DualsubError::NotFound(path.display().to_string()));
    }
    let value: serde_json::Value = read_json_output(path).await?;

    if value.is_array() {
        let words: Vec<Word> = serde_json::from_value(value)?;
        return Ok(common::MappedWords { words, language: None });
    }
    if value.get("transcription").is_some() {
        let output: whisper_cpp::WhisperCppOutput = serde_json::from_value(value)?;
        return whisper_cpp::WhisperCppMapper::to_words(output);
    }
    if value.get("segments").is_some() {
        let output: openai::OpenAIWhisperOutput = serde_json::from_value(value)?;
        return openai::OpenAIWhisperMapper::to_words(output);
    }

    Err(DualsubError::Transcription(format!(
        "{}: unrecognized word stream format",
        path.display()
    )))
}
