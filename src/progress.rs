//! Typed pipeline events and progress tracking.
//!
//! Every stage reports through one ordered channel so that log lines and
//! progress updates reach the consumer in the order they were produced.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

static FFMPEG_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").expect("valid duration regex")
});

static FFMPEG_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)").expect("valid time regex")
});

/// Pipeline stage an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Transcribe,
    Translate,
    /// Subtitle burn pass (1 or 2)
    Mux { pass: u8 },
    /// Both burn passes of one video, as seen by the batch queue
    Fuse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Transcribe => write!(f, "transcribe"),
            Stage::Translate => write!(f, "translate"),
            Stage::Mux { pass } => write!(f, "mux pass {}", pass),
            Stage::Fuse => write!(f, "fuse"),
        }
    }
}

/// How a queued work item ended
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded,
    Failed(String),
    /// Dropped from the queue after cancellation
    Skipped,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress { stage: Stage, percent: f64 },
    Log { text: String },
    ItemStarted { stage: Stage, item: String },
    ItemFinished { stage: Stage, item: String, outcome: ItemOutcome },
}

/// Sending half of the event channel.
///
/// A disabled sink silently drops everything, which is what library callers
/// and most tests want.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn progress(&self, stage: Stage, percent: f64) {
        self.send(PipelineEvent::Progress { stage, percent });
    }

    pub fn log<S: Into<String>>(&self, text: S) {
        self.send(PipelineEvent::Log { text: text.into() });
    }

    pub fn item_started<S: Into<String>>(&self, stage: Stage, item: S) {
        self.send(PipelineEvent::ItemStarted {
            stage,
            item: item.into(),
        });
    }

    pub fn item_finished<S: Into<String>>(&self, stage: Stage, item: S, outcome: ItemOutcome) {
        self.send(PipelineEvent::ItemFinished {
            stage,
            item: item.into(),
            outcome,
        });
    }

    fn send(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver only means nobody is watching anymore
            let _ = tx.send(event);
        }
    }
}

/// Converts a growing measure of work into a non-decreasing percentage.
///
/// A value is reported only when it strictly exceeds every value seen
/// before, so repeated or regressing inputs produce no event. Values past the
/// total are passed through (a word ending after the probed duration yields
/// more than 100).
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    stage: Stage,
    total: f64,
    high_water: Option<f64>,
}

impl ProgressTracker {
    pub fn new(stage: Stage, total: f64) -> Self {
        Self {
            stage,
            total,
            high_water: None,
        }
    }

    /// Record `value` and return the new percentage if it advanced.
    pub fn observe(&mut self, value: f64) -> Option<f64> {
        if self.total.is_nan() || self.total <= 0.0 || !value.is_finite() {
            return None;
        }
        let baseline = self.high_water.unwrap_or(0.0);
        if value <= baseline {
            return None;
        }
        self.high_water = Some(value);
        Some(value / self.total * 100.0)
    }

    /// Record `value` and forward any advance to `sink`.
    pub fn report(&mut self, value: f64, sink: &EventSink) -> Option<f64> {
        let percent = self.observe(value)?;
        sink.progress(self.stage, percent);
        Some(percent)
    }
}

/// Extracts encode progress from ffmpeg's diagnostic stream.
///
/// `Duration: HH:MM:SS.ms` is announced once for the input; `time=HH:MM:SS.ms`
/// repeats while encoding. Time markers seen before a duration are ignored.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLogParser {
    duration: Option<f64>,
    high_water: f64,
}

impl FfmpegLogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one log line; returns a percentage when the line carries a new
    /// time marker and the duration is known.
    pub fn observe_line(&mut self, line: &str) -> Option<f64> {
        if self.duration.is_none() {
            if let Some(caps) = FFMPEG_DURATION_REGEX.captures(line) {
                self.duration = parse_clock(&caps[1], &caps[2], &caps[3]);
            }
        }

        let caps = FFMPEG_TIME_REGEX.captures(line)?;
        let duration = self.duration.filter(|d| *d > 0.0)?;
        let current = parse_clock(&caps[1], &caps[2], &caps[3])?;
        if current < self.high_water {
            return None;
        }
        self.high_water = current;
        Some(current / duration * 100.0)
    }
}

fn parse_clock(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let h: f64 = hours.parse().ok()?;
    let m: f64 = minutes.parse().ok()?;
    let s: f64 = seconds.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_reports_only_advances() {
        let mut tracker = ProgressTracker::new(Stage::Transcribe, 10.0);
        assert_eq!(tracker.observe(1.0), Some(10.0));
        assert_eq!(tracker.observe(1.0), None);
        assert_eq!(tracker.observe(0.5), None);
        assert_eq!(tracker.observe(5.0), Some(50.0));
    }

    #[test]
    fn test_tracker_passes_values_beyond_total() {
        let mut tracker = ProgressTracker::new(Stage::Transcribe, 10.0);
        assert_eq!(tracker.observe(12.0), Some(120.0));
    }

    #[test]
    fn test_tracker_without_total_stays_silent() {
        let mut tracker = ProgressTracker::new(Stage::Transcribe, 0.0);
        assert_eq!(tracker.observe(3.0), None);
    }

    #[test]
    fn test_tracker_zero_value_is_not_progress() {
        let mut tracker = ProgressTracker::new(Stage::Translate, 4.0);
        assert_eq!(tracker.observe(0.0), None);
        assert_eq!(tracker.observe(1.0), Some(25.0));
    }

    #[test]
    fn test_sink_preserves_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.log("starting");
        sink.progress(Stage::Translate, 50.0);
        sink.log("done");
        drop(sink);

        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Log { text: "starting".into() });
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Progress { stage: Stage::Translate, percent: 50.0 }
        );
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Log { text: "done".into() });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disabled_sink_drops_events() {
        let sink = EventSink::disabled();
        sink.log("ignored");
        sink.progress(Stage::Transcribe, 10.0);
    }

    #[test]
    fn test_ffmpeg_parser_needs_duration_first() {
        let mut parser = FfmpegLogParser::new();
        assert_eq!(
            parser.observe_line("frame=   10 fps=0.0 q=0.0 size=0kB time=00:00:01.00 bitrate=N/A"),
            None
        );
        assert_eq!(
            parser.observe_line("  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s"),
            None
        );
        let percent = parser
            .observe_line("frame=  120 fps=30 q=28.0 size=256kB time=00:00:05.00 bitrate=419.4kb/s")
            .unwrap();
        assert!((percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_ffmpeg_parser_keeps_first_duration() {
        let mut parser = FfmpegLogParser::new();
        parser.observe_line("  Duration: 01:00:00.00, start: 0.000000");
        parser.observe_line("  Duration: 00:00:05.00, start: 0.000000");
        let percent = parser.observe_line("time=00:30:00.00").unwrap();
        assert!((percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_ffmpeg_parser_ignores_unavailable_time() {
        let mut parser = FfmpegLogParser::new();
        parser.observe_line("Duration: 00:00:10.00");
        assert_eq!(parser.observe_line("size=N/A time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Mux { pass: 2 }.to_string(), "mux pass 2");
        assert_eq!(Stage::Translate.to_string(), "translate");
    }
}
