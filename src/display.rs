//! Terminal progress bars fed by the pipeline event channel.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::progress::{ItemOutcome, PipelineEvent, Stage};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {prefix:>14} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// Turns pipeline events into one progress bar per running stage
pub struct EventRenderer {
    current: Option<(Stage, ProgressBar)>,
    message: String,
    hidden: bool,
}

impl EventRenderer {
    pub fn new() -> Self {
        Self {
            current: None,
            message: String::new(),
            hidden: false,
        }
    }

    /// A renderer that draws nothing
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::new()
        }
    }

    /// Consume events until every sender is gone.
    pub async fn run(mut self, mut events: UnboundedReceiver<PipelineEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        self.finish_current("");
    }

    pub fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress { stage, percent } => {
                let bar = self.bar_for(stage);
                bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
            }
            PipelineEvent::Log { text } => {
                if let Some((_, bar)) = &self.current {
                    bar.set_message(text.clone());
                }
                self.message = text;
            }
            PipelineEvent::ItemStarted { .. } => {
                self.finish_current("");
                self.message.clear();
            }
            PipelineEvent::ItemFinished { item, outcome, .. } => {
                let summary = match outcome {
                    ItemOutcome::Succeeded => format!("{} done", item),
                    ItemOutcome::Failed(reason) => format!("{} failed: {}", item, reason),
                    ItemOutcome::Skipped => format!("{} skipped", item),
                };
                self.finish_current(&summary);
            }
        }
    }

    /// Position of the active bar, if any
    pub fn position(&self) -> Option<(Stage, u64)> {
        self.current.as_ref().map(|(stage, bar)| (*stage, bar.position()))
    }

    fn bar_for(&mut self, stage: Stage) -> &ProgressBar {
        let stale = matches!(&self.current, Some((current, _)) if *current != stage);
        if stale {
            self.finish_current("");
        }

        let hidden = self.hidden;
        let message = self.message.clone();
        let (_, bar) = self
            .current
            .get_or_insert_with(|| (stage, new_bar(stage, &message, hidden)));
        bar
    }

    fn finish_current(&mut self, message: &str) {
        if let Some((_, bar)) = self.current.take() {
            if message.is_empty() {
                bar.finish();
            } else {
                bar.finish_with_message(message.to_string());
            }
        }
    }
}

impl Default for EventRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_bar(stage: Stage, message: &str, hidden: bool) -> ProgressBar {
    let target = if hidden {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stderr()
    };
    let bar = ProgressBar::with_draw_target(Some(100), target);
    if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_prefix(stage.to_string());
    bar.set_message(message.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_moves_bar() {
        let mut renderer = EventRenderer::hidden();
        renderer.handle(PipelineEvent::Progress { stage: Stage::Translate, percent: 33.4 });
        assert_eq!(renderer.position(), Some((Stage::Translate, 33)));

        renderer.handle(PipelineEvent::Progress { stage: Stage::Translate, percent: 140.0 });
        assert_eq!(renderer.position(), Some((Stage::Translate, 100)));
    }

    #[test]
    fn test_stage_change_starts_new_bar() {
        let mut renderer = EventRenderer::hidden();
        renderer.handle(PipelineEvent::Progress { stage: Stage::Mux { pass: 1 }, percent: 90.0 });
        renderer.handle(PipelineEvent::Progress { stage: Stage::Mux { pass: 2 }, percent: 10.0 });
        assert_eq!(renderer.position(), Some((Stage::Mux { pass: 2 }, 10)));
    }

    #[test]
    fn test_item_finish_closes_bar() {
        let mut renderer = EventRenderer::hidden();
        renderer.handle(PipelineEvent::ItemStarted { stage: Stage::Fuse, item: "a.mp4".into() });
        renderer.handle(PipelineEvent::Log { text: "Adding subtitles".into() });
        renderer.handle(PipelineEvent::Progress { stage: Stage::Mux { pass: 1 }, percent: 50.0 });
        renderer.handle(PipelineEvent::ItemFinished {
            stage: Stage::Fuse,
            item: "a.mp4".into(),
            outcome: ItemOutcome::Succeeded,
        });
        assert_eq!(renderer.position(), None);
    }

    #[tokio::test]
    async fn test_run_ends_when_senders_drop() {
        let (sink, rx) = crate::progress::EventSink::channel();
        sink.progress(Stage::Transcribe, 20.0);
        drop(sink);
        EventRenderer::hidden().run(rx).await;
    }
}
