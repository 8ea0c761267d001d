use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DualsubError, Result};
use crate::lookup::find_subtitle_for_video;
use crate::media::{BurnRequest, MediaProcessorFactory, MediaProcessorTrait};
use crate::progress::{EventSink, Stage};
use crate::queue::{QueueReport, WorkQueue};
use crate::segment::segment;
use crate::subtitle::{read_srt, split_bilingual, write_srt};
use crate::transcribe::{TranscriberFactory, TranscriberTrait};
use crate::translate::{check_ollama_availability, translate_cues, Translator, TranslatorFactory};

/// Path of the monolingual transcript: `<stem>.srt`
pub fn transcript_path(subtitle_dir: &Path, stem: &str) -> PathBuf {
    subtitle_dir.join(format!("{}.srt", stem))
}

/// Path of the bilingual file: `<stem>_<target>.srt`
pub fn bilingual_path(subtitle_dir: &Path, stem: &str, target_language: &str) -> PathBuf {
    subtitle_dir.join(format!("{}_{}.srt", stem, target_language))
}

/// Path of one split track: `<stem>.<language>.srt`
pub fn track_path(subtitle_dir: &Path, stem: &str, language: &str) -> PathBuf {
    subtitle_dir.join(format!("{}.{}.srt", stem, language))
}

/// Output base (no extension) of the first burn pass
pub fn pass1_base(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}_pass1", stem))
}

/// Output base (no extension) of the finished video
pub fn final_base(
    output_dir: &Path,
    stem: &str,
    source_language: &str,
    target_language: &str,
) -> PathBuf {
    output_dir.join(format!("{}_{}_{}", stem, source_language, target_language))
}

fn video_stem(video: &Path) -> Result<String> {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| DualsubError::NotFound(format!("invalid video path {}", video.display())))
}

/// A video waiting in a batch queue, shown by file name
#[derive(Debug, Clone, PartialEq)]
pub struct VideoItem(pub PathBuf);

impl fmt::Display for VideoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.file_name() {
            Some(name) => write!(f, "{}", name.to_string_lossy()),
            None => write!(f, "{}", self.0.display()),
        }
    }
}

/// Per-stage reports of a batch run. A video only enters a stage after it
/// succeeded in the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub transcribe: QueueReport,
    pub translate: QueueReport,
    pub fuse: QueueReport,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.transcribe.all_succeeded()
            && self.translate.all_succeeded()
            && self.fuse.all_succeeded()
    }
}

pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaProcessorTrait>,
    transcriber: Box<dyn TranscriberTrait>,
    translator: Box<dyn Translator>,
    events: EventSink,
    cancel: CancellationToken,
}

impl Workflow {
    pub fn new(config: Config, events: EventSink, cancel: CancellationToken) -> Result<Self> {
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
        let transcriber =
            TranscriberFactory::create_transcriber(config.transcriber.clone(), Arc::clone(&media));
        let translator = TranslatorFactory::create_translator(config.translate.clone())?;

        Ok(Self::with_components(config, media, transcriber, translator, events, cancel))
    }

    /// Assemble a workflow from already-built components
    pub fn with_components(
        config: Config,
        media: Arc<dyn MediaProcessorTrait>,
        transcriber: Box<dyn TranscriberTrait>,
        translator: Box<dyn Translator>,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            media,
            transcriber,
            translator,
            events,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check the external tools the requested stages rely on
    pub async fn check_dependencies(
        &self,
        needs_media: bool,
        needs_translation: bool,
    ) -> Result<()> {
        if needs_media {
            self.media.check_availability().await?;
        }
        if needs_translation {
            let translate = &self.config.translate;
            check_ollama_availability(&translate.endpoint, &translate.model).await?;
        }
        Ok(())
    }

    /// Transcribe `video` and write `<stem>.srt` into the subtitle directory.
    pub async fn transcribe_file(&self, video: &Path) -> Result<PathBuf> {
        if !video.exists() {
            return Err(DualsubError::NotFound(video.display().to_string()));
        }
        let stem = video_stem(video)?;
        self.events.log(format!("Generating subtitles: {}", stem));

        let transcript = self.transcriber.transcribe(video, &self.cancel).await?;
        let cues = segment(
            transcript.words,
            transcript.duration,
            &self.config.segmenter,
            &self.events,
        );
        if cues.is_empty() {
            warn!("No speech found in {}, writing an empty transcript", video.display());
        }

        let output = transcript_path(&self.config.paths.subtitle_dir, &stem);
        write_srt(&output, &cues).await?;

        info!("Wrote {} cues to {}", cues.len(), output.display());
        self.events.log(format!("Subtitles generated: {}", output.display()));
        Ok(output)
    }

    /// Translate the transcript of `video` into `<stem>_<target>.srt`.
    ///
    /// Nothing is written unless every cue was translated.
    pub async fn translate_file(&self, video: &Path) -> Result<PathBuf> {
        let stem = video_stem(video)?;
        let subtitle_dir = &self.config.paths.subtitle_dir;
        let target = &self.config.fuse.target_language;

        let source = find_subtitle_for_video(subtitle_dir, video)?;
        info!("Translating {} to {}", source.display(), target);
        self.events.log(format!("Translating subtitles: {}", display_name(&source)));

        let cues = read_srt(&source).await?;
        let bilingual = translate_cues(
            self.translator.as_ref(),
            &cues,
            target,
            self.config.translate.max_retries,
            &self.events,
            &self.cancel,
        )
        .await?;

        let output = bilingual_path(subtitle_dir, &stem, target);
        write_srt(&output, &bilingual).await?;

        self.events.log(format!("Translation finished: {}", output.display()));
        Ok(output)
    }

    /// Split the bilingual file of `video` into its two language tracks.
    ///
    /// Returns `(first_line_track, second_line_track)`.
    pub async fn split_file(&self, video: &Path) -> Result<(PathBuf, PathBuf)> {
        let stem = video_stem(video)?;
        let subtitle_dir = &self.config.paths.subtitle_dir;
        let fuse = &self.config.fuse;

        let bilingual = read_srt(bilingual_path(subtitle_dir, &stem, &fuse.target_language)).await?;
        let tracks = split_bilingual(&bilingual)?;

        let first = track_path(subtitle_dir, &stem, &fuse.source_language);
        let second = track_path(subtitle_dir, &stem, &fuse.target_language);
        write_srt(&first, &tracks.first).await?;
        write_srt(&second, &tracks.second).await?;

        info!("Split {} cues into {} and {}", bilingual.len(), first.display(), second.display());
        Ok((first, second))
    }

    /// Burn both language tracks into `video` in two passes.
    ///
    /// Pass 1 burns the second-line track into an intermediate video; pass 2
    /// burns the first-line track on top of it. The intermediate is removed
    /// afterwards unless `keep_intermediate` is set.
    pub async fn fuse_file(&self, video: &Path) -> Result<PathBuf> {
        if !video.exists() {
            return Err(DualsubError::NotFound(video.display().to_string()));
        }
        let stem = video_stem(video)?;
        let (first_track, second_track) = self.split_file(video).await?;

        let fuse = &self.config.fuse;
        let output_dir = self.config.paths.output_dir();
        fs::create_dir_all(output_dir).await?;
        let font_file = fuse.font_file.as_deref();

        let pass1_output_base = pass1_base(output_dir, &stem);
        let pass1 = self
            .media
            .burn_subtitles(
                BurnRequest {
                    video,
                    subtitles: &second_track,
                    output_base: &pass1_output_base,
                    style: &fuse.second_line,
                    font_file,
                },
                Stage::Mux { pass: 1 },
                &self.events,
                &self.cancel,
            )
            .await?;

        let final_output_base =
            final_base(output_dir, &stem, &fuse.source_language, &fuse.target_language);
        let result = self
            .media
            .burn_subtitles(
                BurnRequest {
                    video: &pass1,
                    subtitles: &first_track,
                    output_base: &final_output_base,
                    style: &fuse.first_line,
                    font_file,
                },
                Stage::Mux { pass: 2 },
                &self.events,
                &self.cancel,
            )
            .await;

        if !fuse.keep_intermediate {
            if let Err(e) = fs::remove_file(&pass1).await {
                warn!("Failed to remove intermediate {}: {}", pass1.display(), e);
            }
        }

        let output = result?;
        self.events.log(format!("Dual subtitles burned: {}", output.display()));
        Ok(output)
    }

    /// Transcribe, translate and fuse a single video
    pub async fn process_file(&self, video: &Path) -> Result<PathBuf> {
        info!("Processing single file: {}", video.display());
        self.transcribe_file(video).await?;
        self.translate_file(video).await?;
        self.fuse_file(video).await
    }

    /// Run each stage over `videos` as its own queue.
    ///
    /// With `transcribe` off, videos go straight to translation (their
    /// transcripts are expected to exist already).
    pub async fn batch(&self, videos: Vec<PathBuf>, transcribe: bool) -> BatchReport {
        let mut report = BatchReport::default();
        let mut pending = videos;

        if transcribe {
            report.transcribe = self
                .run_stage(Stage::Transcribe, &pending, move |video| async move {
                    self.transcribe_file(&video).await.map(|_| ())
                })
                .await;
            pending = succeeded(pending, &report.transcribe);
        }

        report.translate = self
            .run_stage(Stage::Translate, &pending, move |video| async move {
                self.translate_file(&video).await.map(|_| ())
            })
            .await;
        pending = succeeded(pending, &report.translate);

        report.fuse = self
            .run_stage(Stage::Fuse, &pending, move |video| async move {
                self.fuse_file(&video).await.map(|_| ())
            })
            .await;

        report
    }

    async fn run_stage<F, Fut>(&self, stage: Stage, videos: &[PathBuf], work: F) -> QueueReport
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut queue = WorkQueue::new(stage);
        queue.extend(videos.iter().cloned().map(VideoItem));
        queue
            .run(&self.events, &self.cancel, |item: VideoItem| work(item.0))
            .await
    }
}

/// Videos whose item in `report` succeeded; the report is in queue order.
fn succeeded(videos: Vec<PathBuf>, report: &QueueReport) -> Vec<PathBuf> {
    videos
        .into_iter()
        .zip(report.items.iter())
        .filter(|(_, item)| item.outcome.is_success())
        .map(|(video, _)| video)
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
