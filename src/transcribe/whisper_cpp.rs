use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::common::{
    read_json_output, resolve_duration, run_transcriber, MappedWords, TranscriptionMapper,
    WordTranscript,
};
use super::TranscriberTrait;
use crate::config::TranscriberConfig;
use crate::error::{DualsubError, Result};
use crate::media::MediaProcessorTrait;
use crate::segment::Word;

/// whisper.cpp `-oj` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    #[serde(default)]
    pub result: Option<WhisperCppResult>,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: Option<String>,
}

/// One output segment; with `-ml 1 -sow` each holds a single word
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment bounds in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: u64,
    pub to: u64,
}

/// Mapper for whisper.cpp format to words
pub struct WhisperCppMapper;

impl TranscriptionMapper<WhisperCppOutput> for WhisperCppMapper {
    fn to_words(whisper_output: WhisperCppOutput) -> Result<MappedWords> {
        let words = whisper_output
            .transcription
            .into_iter()
            .map(|seg| {
                let start = seg.offsets.from as f64 / 1000.0;
                let end = (seg.offsets.to.max(seg.offsets.from)) as f64 / 1000.0;
                Word::new(seg.text, start, end)
            })
            .collect();

        Ok(MappedWords {
            words,
            language: whisper_output.result.and_then(|r| r.language),
        })
    }
}

/// whisper.cpp command-line implementation
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
    media: Arc<dyn MediaProcessorTrait>,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig, media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { config, media }
    }

    /// Convert a model name to the actual file path
    pub fn resolve_model_path(&self) -> PathBuf {
        let model_name = &self.config.model;
        // If it's already a path, return as-is
        if model_name.contains('/') || model_name.ends_with(".bin") {
            debug!("Model path already resolved: {}", model_name);
            return PathBuf::from(model_name);
        }

        let resolved = self.config.models_dir.join(format!("ggml-{}.bin", model_name));
        debug!("Resolved model '{}' to path: {}", model_name, resolved.display());
        resolved
    }

    fn build_command(&self, audio_path: &Path, output_base: &Path) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(self.resolve_model_path())
            .arg("-f")
            .arg(audio_path)
            .arg("-ml")
            .arg("1")
            .arg("-sow")
            .arg("-oj")
            .arg("-of")
            .arg(output_base);

        if let Some(lang) = &self.config.language {
            cmd.arg("-l").arg(lang);
        }
        cmd
    }
}

#[async_trait]
impl TranscriberTrait for WhisperCppTranscriber {
    async fn transcribe(
        &self,
        media_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<WordTranscript> {
        info!("Transcribing {} with whisper.cpp", media_path.display());

        let temp_dir = tempfile::tempdir()
            .map_err(|e| DualsubError::Transcription(format!("Failed to create temp dir: {}", e)))?;
        let audio_path = temp_dir.path().join("audio.wav");
        let output_base = temp_dir.path().join("transcript");

        self.media
            .extract_audio(media_path, &audio_path)
            .await
            .map_err(|e| DualsubError::Transcription(format!("Audio extraction failed: {}", e)))?;

        let cmd = self.build_command(&audio_path, &output_base);
        run_transcriber(cmd, &self.config.binary_path, cancel).await?;

        let output: WhisperCppOutput = read_json_output(&output_base.with_extension("json")).await?;
        let mapped = WhisperCppMapper::to_words(output)?;
        let duration = resolve_duration(self.media.probe_duration(media_path).await, &mapped.words);
        info!("whisper.cpp produced {} words over {:.1}s", mapped.words.len(), duration);

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
    use crate::config::MediaConfig;
    use crate::media::MediaProcessorFactory;

    const SAMPLE: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "small"},
        "params": {"model": "ggml-small.en.bin", "language": "en", "translate": false},
        "result": {"language": "en"},
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:00,420"},
             "offsets": {"from": 0, "to": 420}, "text": " Hello,"},
            {"timestamps": {"from": "00:00:00,420", "to": "00:00:01,000"},
             "offsets": {"from": 420, "to": 1000}, "text": " world."}
        ]
    }"#;

    fn transcriber(config: TranscriberConfig) -> WhisperCppTranscriber {
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(MediaConfig::default()));
        WhisperCppTranscriber::new(config, media)
    }

    #[test]
    fn test_maps_offsets_to_seconds() {
        let output: WhisperCppOutput = serde_json::from_str(SAMPLE).unwrap();
        let mapped = WhisperCppMapper::to_words(output).unwrap();
        assert_eq!(
            mapped.words,
            vec![Word::new(" Hello,", 0.0, 0.42), Word::new(" world.", 0.42, 1.0)]
        );
        assert_eq!(mapped.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_missing_result_block() {
        let output: WhisperCppOutput = serde_json::from_str(r#"{"transcription": []}"#).unwrap();
        let mapped = WhisperCppMapper::to_words(output).unwrap();
        assert!(mapped.words.is_empty());
        assert!(mapped.language.is_none());
    }

    #[test]
    fn test_model_resolution() {
        let config = TranscriberConfig::default();
        assert_eq!(
            transcriber(config.clone()).resolve_model_path(),
            PathBuf::from(".dualsub/models/ggml-small.en.bin")
        );

        let explicit = TranscriberConfig {
            model: "/models/custom.bin".to_string(),
            ..config
        };
        assert_eq!(transcriber(explicit).resolve_model_path(), PathBuf::from("/models/custom.bin"));
    }

    #[test]
    fn test_command_arguments() {
        let config = TranscriberConfig {
            language: Some("en".to_string()),
            ..TranscriberConfig::default()
        };
        let cmd = transcriber(config)
            .build_command(Path::new("/tmp/a.wav"), Path::new("/tmp/transcript"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-m",
                ".dualsub/models/ggml-small.en.bin",
                "-f",
                "/tmp/a.wav",
                "-ml",
                "1",
                "-sow",
                "-oj",
                "-of",
                "/tmp/transcript",
                "-l",
                "en",
            ]
        );
    }
}
