// Media processing over ffmpeg and ffprobe
//
// - commands: argument building (burn filter, codec profile, audio extraction, probe)
// - processor: process execution with progress, cancellation and cleanup

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::progress::{EventSink, Stage};

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Burn one subtitle track into a video; returns the written path
    async fn burn_subtitles(
        &self,
        request: BurnRequest<'_>,
        stage: Stage,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    /// Extract 16 kHz mono audio from a video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Container duration in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
