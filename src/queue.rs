//! Sequential FIFO work queue.
//!
//! One worker drains the queue, awaiting each item before taking the next.
//! A failing item is reported and the loop moves on. Cancellation is checked
//! between items; whatever is still queued at that point is reported as
//! skipped, as is an item whose work was interrupted by the cancellation.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DualsubError, Result};
use crate::progress::{EventSink, ItemOutcome, Stage};

/// Per-item result of a drained queue
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub item: String,
    pub outcome: ItemOutcome,
}

/// Summary of one queue run, in queue order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueReport {
    pub items: Vec<ItemReport>,
}

impl QueueReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| o.is_success())
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped))
    }

    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|r| r.outcome.is_success())
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    stage: Stage,
    items: VecDeque<T>,
}

impl<T: fmt::Display> WorkQueue<T> {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drain the queue through `work`, one item at a time.
    pub async fn run<F, Fut>(
        mut self,
        events: &EventSink,
        cancel: &CancellationToken,
        mut work: F,
    ) -> QueueReport
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let total = self.items.len();
        let mut report = QueueReport::default();
        info!("Processing {} item(s) for {}", total, self.stage);

        while let Some(item) = self.items.pop_front() {
            let name = item.to_string();
            if cancel.is_cancelled() {
                self.skip(name, events, &mut report);
                continue;
            }

            info!("[{}/{}] {}: {}", report.items.len() + 1, total, self.stage, name);
            events.item_started(self.stage, name.clone());
            let outcome = match work(item).await {
                Ok(()) => ItemOutcome::Succeeded,
                Err(DualsubError::Cancelled(what)) => {
                    info!("{} interrupted for {}: {}", self.stage, name, what);
                    ItemOutcome::Skipped
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", self.stage, name, e);
                    events.log(format!("{} failed for {}: {}", self.stage, name, e));
                    ItemOutcome::Failed(e.to_string())
                }
            };
            events.item_finished(self.stage, name.clone(), outcome.clone());
            report.items.push(ItemReport { item: name, outcome });
        }

        info!(
            "{} finished: {} succeeded, {} failed, {} skipped",
            self.stage,
            report.succeeded(),
            report.failed(),
            report.skipped()
        );
        report
    }

    fn skip(&self, name: String, events: &EventSink, report: &mut QueueReport) {
        events.item_finished(self.stage, name.clone(), ItemOutcome::Skipped);
        report.items.push(ItemReport {
            item: name,
            outcome: ItemOutcome::Skipped,
        });
    }
}

impl<T: fmt::Display> Extend<T> for WorkQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PipelineEvent;
    use std::sync::{Arc, Mutex};

    fn queue_of(names: &[&str]) -> WorkQueue<String> {
        let mut queue = WorkQueue::new(Stage::Translate);
        queue.extend(names.iter().map(|s| s.to_string()));
        queue
    }

    #[tokio::test]
    async fn test_processes_in_fifo_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let queue = queue_of(&["a", "b", "c"]);
        let report = queue
            .run(&EventSink::disabled(), &CancellationToken::new(), |item| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(item);
                    Ok(())
                }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.succeeded(), 3);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_queue() {
        let queue = queue_of(&["ok1", "bad", "ok2"]);
        let report = queue
            .run(&EventSink::disabled(), &CancellationToken::new(), |item| async move {
                if item == "bad" {
                    Err(DualsubError::Translation("model unavailable".to_string()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            &report.items[1].outcome,
            ItemOutcome::Failed(m) if m.contains("model unavailable")
        ));
        assert!(report.items[2].outcome.is_success());
    }

    #[tokio::test]
    async fn test_cancellation_skips_remaining_items() {
        let cancel = CancellationToken::new();
        let queue = queue_of(&["first", "second", "third"]);
        let report = queue
            .run(&EventSink::disabled(), &cancel, |item| {
                let cancel = cancel.clone();
                async move {
                    if item == "first" {
                        cancel.cancel();
                    }
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.items[2].item, "third");
    }

    #[tokio::test]
    async fn test_interrupted_item_counts_as_skipped() {
        let cancel = CancellationToken::new();
        let queue = queue_of(&["done", "burning", "queued"]);
        let report = queue
            .run(&EventSink::disabled(), &cancel, |item| {
                let cancel = cancel.clone();
                async move {
                    if item == "burning" {
                        cancel.cancel();
                        return Err(DualsubError::Cancelled("subtitle burn".to_string()));
                    }
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.items[1].outcome, ItemOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_events_are_ordered_per_item() {
        let (sink, mut rx) = EventSink::channel();
        let queue = queue_of(&["one", "two"]);
        queue
            .run(&sink, &CancellationToken::new(), |_| async { Ok(()) })
            .await;
        drop(sink);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                PipelineEvent::ItemStarted { stage: Stage::Translate, item: "one".into() },
                PipelineEvent::ItemFinished {
                    stage: Stage::Translate,
                    item: "one".into(),
                    outcome: ItemOutcome::Succeeded
                },
                PipelineEvent::ItemStarted { stage: Stage::Translate, item: "two".into() },
                PipelineEvent::ItemFinished {
                    stage: Stage::Translate,
                    item: "two".into(),
                    outcome: ItemOutcome::Succeeded
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let queue: WorkQueue<String> = WorkQueue::new(Stage::Transcribe);
        assert!(queue.is_empty());
        let report = queue
            .run(&EventSink::disabled(), &CancellationToken::new(), |_| async { Ok(()) })
            .await;
        assert!(report.items.is_empty());
    }
}
