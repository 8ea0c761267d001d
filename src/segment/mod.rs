// Word-timed subtitle segmentation
//
// Turns the word stream produced by a transcriber into readable cues:
// - state: the pending word buffer and its per-word transition
// - pause: secondary split of long segments at their longest pause
//
// The engine is synchronous and performs no I/O. Cues are emitted in a
// single forward pass and never revisited once released.

pub mod pause;
pub mod state;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use pause::{
    find_pause_split, split_at_longest_pause, PauseSplitParams, DEFAULT_MAX_UNSPLIT_LEN,
};
pub use state::{BoundaryRules, BreakReason, PendingBuffer, ReadySegment};

use crate::config::SegmenterConfig;
use crate::progress::{EventSink, ProgressTracker, Stage};
use crate::subtitle::Cue;

/// One transcribed token with its timing in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new<S: Into<String>>(text: S, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Last character of the raw token, if it has any
    pub fn trailing_char(&self) -> Option<char> {
        self.text.chars().next_back()
    }
}

/// Online segmenter fed one word at a time
#[derive(Debug, Clone)]
pub struct Segmenter {
    rules: BoundaryRules,
    standard: PauseSplitParams,
    tail: PauseSplitParams,
    max_unsplit_len: usize,
    state: PendingBuffer,
}

impl Segmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            rules: BoundaryRules::new(
                &config.sentence_end_punctuation,
                &config.force_break_punctuation,
                config.long_run_len,
            ),
            standard: config.standard_split,
            tail: config.tail_split,
            max_unsplit_len: config.max_unsplit_len,
            state: PendingBuffer::new(),
        }
    }

    /// Feed one word; returns the word groups that became final cues.
    pub fn push(&mut self, word: Word) -> Vec<Vec<Word>> {
        let state = std::mem::take(&mut self.state);
        let (next, ready) = state.step(word, &self.rules);
        self.state = next;

        match ready {
            Some(segment) => {
                debug!("Released {} words ({:?})", segment.words.len(), segment.reason);
                self.drain(segment.words, self.standard)
            }
            None => Vec::new(),
        }
    }

    /// Flush the remaining buffer with the tail split parameters.
    pub fn finish(mut self) -> Vec<Vec<Word>> {
        let state = std::mem::take(&mut self.state);
        match state.finish() {
            Some(segment) => self.drain(segment.words, self.tail),
            None => Vec::new(),
        }
    }

    fn drain(&self, words: Vec<Word>, params: PauseSplitParams) -> Vec<Vec<Word>> {
        let mut groups = Vec::new();
        let mut pending = Some(words);
        while let Some(chunk) = pending.take() {
            let (head, rest) = split_at_longest_pause(chunk, params, self.max_unsplit_len);
            groups.push(head);
            pending = rest;
        }
        groups
    }
}

/// Group a word stream into cue-sized runs.
///
/// `observe` sees every word before it enters the buffer. The returned
/// groups partition the input in order.
pub fn segment_words<I, F>(words: I, config: &SegmenterConfig, mut observe: F) -> Vec<Vec<Word>>
where
    I: IntoIterator<Item = Word>,
    F: FnMut(&Word),
{
    let mut segmenter = Segmenter::new(config);
    let mut groups = Vec::new();
    for word in words {
        observe(&word);
        groups.extend(segmenter.push(word));
    }
    groups.extend(segmenter.finish());
    groups
}

/// Segment a word stream into indexed cues, reporting progress against
/// `total_duration` (seconds) through `events`.
pub fn segment<I>(
    words: I,
    total_duration: f64,
    config: &SegmenterConfig,
    events: &EventSink,
) -> Vec<Cue>
where
    I: IntoIterator<Item = Word>,
{
    let mut tracker = ProgressTracker::new(Stage::Transcribe, total_duration);
    let groups = segment_words(words, config, |word| {
        tracker.report(word.end, events);
    });

    let mut cues = Vec::with_capacity(groups.len());
    for group in &groups {
        match build_cue(cues.len() + 1, group) {
            Some(cue) => cues.push(cue),
            None => debug!("Dropping {} words without text", group.len()),
        }
    }

    debug!("Segmented {} word groups into {} cues", groups.len(), cues.len());
    cues
}

/// Build a cue spanning `words`; `None` when there is no text to show.
pub fn build_cue(index: usize, words: &[Word]) -> Option<Cue> {
    let first = words.first()?;
    let last = words.last()?;
    let joined = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
    let text = normalize_whitespace(&joined);
    if text.is_empty() {
        return None;
    }
    Some(Cue::new(index, first.start, last.end, text))
}

/// Collapse every whitespace run to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
