use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DualsubError, Result};
use crate::segment::pause::{PauseSplitParams, DEFAULT_MAX_UNSPLIT_LEN};
use crate::segment::state::{
    DEFAULT_FORCE_BREAK_PUNCTUATION, DEFAULT_LONG_RUN_LEN, DEFAULT_SENTENCE_END_PUNCTUATION,
};

/// Name of the configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

fn default_max_retries() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_extra_options() -> Vec<String> {
    ["-crf", "23", "-preset", "ultrafast"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segmenter: SegmenterConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    pub fuse: FuseConfig,
    pub paths: PathsConfig,
}

/// Thresholds and punctuation classes of the segmentation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Characters that mark a possible cue end (commas included)
    pub sentence_end_punctuation: String,
    /// Characters that end a cue regardless of its length
    pub force_break_punctuation: String,
    /// Buffers longer than this split at their last punctuation
    pub long_run_len: usize,
    /// Segments up to this many words are never pause-split
    pub max_unsplit_len: usize,
    /// Pause split bounds while the stream is running
    pub standard_split: PauseSplitParams,
    /// Pause split bounds for the end-of-stream flush
    pub tail_split: PauseSplitParams,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sentence_end_punctuation: DEFAULT_SENTENCE_END_PUNCTUATION.to_string(),
            force_break_punctuation: DEFAULT_FORCE_BREAK_PUNCTUATION.to_string(),
            long_run_len: DEFAULT_LONG_RUN_LEN,
            max_unsplit_len: DEFAULT_MAX_UNSPLIT_LEN,
            standard_split: PauseSplitParams::STANDARD,
            tail_split: PauseSplitParams::TAIL,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.long_run_len == 0 {
            return Err(DualsubError::Config(
                "segmenter.long_run_len must be at least 1".to_string(),
            ));
        }
        let splits = [
            ("standard_split", self.standard_split),
            ("tail_split", self.tail_split),
        ];
        for (name, params) in splits {
            if params.min_len == 0 || params.max_len <= params.min_len {
                return Err(DualsubError::Config(format!(
                    "segmenter.{}: need 0 < min_len < max_len, got min_len={} max_len={}",
                    name, params.min_len, params.max_len
                )));
            }
        }
        if let Some(c) = self
            .force_break_punctuation
            .chars()
            .find(|c| !self.sentence_end_punctuation.contains(*c))
        {
            return Err(DualsubError::Config(format!(
                "segmenter.force_break_punctuation: '{}' is not sentence-ending punctuation",
                c
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriberImplementation {
    /// whisper.cpp command line (`whisper-cli`)
    WhisperCpp,
    /// OpenAI whisper Python command line (`whisper`)
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    pub implementation: TranscriberImplementation,
    /// Path to transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Model name or path. whisper.cpp names resolve to `ggml-<name>.bin`
    /// under `models_dir`.
    pub model: String,
    /// Directory holding whisper.cpp model files
    pub models_dir: PathBuf,
    /// Source language hint; detected when absent
    pub language: Option<String>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            implementation: TranscriberImplementation::WhisperCpp,
            binary_path: "whisper-cli".to_string(),
            model: "small.en".to_string(),
            models_dir: PathBuf::from(".dualsub/models"),
            language: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Additional attempts per cue before the file is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe, used for the media duration
    pub ffprobe_path: String,
    /// Encoding options appended after the video codec
    /// Common options: ["-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"]
    #[serde(default = "default_extra_options")]
    pub extra_options: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            extra_options: default_extra_options(),
        }
    }
}

/// ASS color literal `&HAABBGGRR`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssColor(String);

impl AssColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AssColor {
    type Err = DualsubError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("&H")
            .ok_or_else(|| DualsubError::Config(format!("color '{}' must start with &H", s)))?;
        if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DualsubError::Config(format!(
                "color '{}' must be &H followed by 8 hex digits (AABBGGRR)",
                s
            )));
        }
        Ok(Self(format!("&H{}", digits.to_ascii_uppercase())))
    }
}

impl TryFrom<String> for AssColor {
    type Error = DualsubError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AssColor> for String {
    fn from(color: AssColor) -> Self {
        color.0
    }
}

impl fmt::Display for AssColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Look of one burned subtitle track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStyle {
    pub color: AssColor,
    pub font_size: u32,
    pub margin_v: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    /// Language of the first line of each bilingual cue
    pub source_language: String,
    /// Language of the translation (second line)
    pub target_language: String,
    /// Optional font file; its directory becomes the libass fonts dir
    pub font_file: Option<PathBuf>,
    /// Keep the pass 1 video next to the final output
    pub keep_intermediate: bool,
    /// Burned first, from the line after the break
    pub second_line: TrackStyle,
    /// Burned second, from the line before the break
    pub first_line: TrackStyle,
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            font_file: None,
            keep_intermediate: false,
            second_line: TrackStyle {
                color: AssColor("&H00FFFF00".to_string()),
                font_size: 12,
                margin_v: 14,
            },
            first_line: TrackStyle {
                color: AssColor("&H0000FFFF".to_string()),
                font_size: 13,
                margin_v: 38,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where source videos live
    pub video_dir: PathBuf,
    /// Where transcripts, bilingual files and split tracks are written
    pub subtitle_dir: PathBuf,
    /// Where subtitled videos are written; defaults to the video directory
    pub output_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("video"),
            subtitle_dir: PathBuf::from("outsrt"),
            output_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.video_dir)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DualsubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| DualsubError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DualsubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DualsubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        if self.fuse.source_language.trim().is_empty()
            || self.fuse.target_language.trim().is_empty()
        {
            return Err(DualsubError::Config("fuse languages must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_constants() {
        let config = Config::default();
        assert_eq!(config.segmenter.long_run_len, 10);
        assert_eq!(config.segmenter.max_unsplit_len, 16);
        assert_eq!(config.segmenter.standard_split, PauseSplitParams { min_len: 10, max_len: 30 });
        assert_eq!(config.segmenter.tail_split, PauseSplitParams { min_len: 6, max_len: 20 });
        assert_eq!(config.translate.max_retries, 1);
        assert_eq!(config.media.extra_options, vec!["-crf", "23", "-preset", "ultrafast"]);
        assert_eq!(config.fuse.second_line.font_size, 12);
        assert_eq!(config.fuse.first_line.margin_v, 38);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.fuse.target_language = "ja".to_string();
        config.transcriber.implementation = TranscriberImplementation::OpenAI;
        config.paths.output_dir = Some(PathBuf::from("out"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.fuse.target_language, "ja");
        assert_eq!(loaded.transcriber.implementation, TranscriberImplementation::OpenAI);
        assert_eq!(loaded.paths.output_dir(), Path::new("out"));
        assert_eq!(loaded.segmenter, config.segmenter);
        assert_eq!(loaded.fuse.first_line, config.fuse.first_line);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[translate]\nmodel = \"qwen2.5:7b\"\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.model, "qwen2.5:7b");
        assert_eq!(loaded.translate.max_retries, 1);
        assert_eq!(loaded.translate.endpoint, "http://localhost:11434");
        assert_eq!(loaded.paths.subtitle_dir, PathBuf::from("outsrt"));
        assert_eq!(loaded.paths.output_dir(), Path::new("video"));
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[fuse.first_line]\ncolor = \"yellow\"\nfont_size = 13\nmargin_v = 38\n",
        )
        .unwrap();
        assert!(matches!(Config::from_file(&path), Err(DualsubError::Config(_))));
    }

    #[test]
    fn test_ass_color_parsing() {
        assert!("&h00ffff00".parse::<AssColor>().is_err());
        assert_eq!("&H00ffff00".parse::<AssColor>().unwrap().as_str(), "&H00FFFF00");
        assert!("&H00FFFF".parse::<AssColor>().is_err());
        assert!("&H00FFFFGG".parse::<AssColor>().is_err());
        assert!("00FFFF00".parse::<AssColor>().is_err());
    }

    #[test]
    fn test_segmenter_validation() {
        let mut segmenter = SegmenterConfig::default();
        segmenter.tail_split = PauseSplitParams { min_len: 8, max_len: 8 };
        assert!(segmenter.validate().is_err());

        let mut segmenter = SegmenterConfig::default();
        segmenter.force_break_punctuation.push('|');
        assert!(segmenter.validate().is_err());

        let mut segmenter = SegmenterConfig::default();
        segmenter.long_run_len = 0;
        assert!(segmenter.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/dualsub/config.toml"),
            Err(DualsubError::Config(_))
        ));
    }
}
