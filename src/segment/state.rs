use super::Word;

/// Punctuation classes that decide where cues may end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryRules {
    sentence_end: Vec<char>,
    force_break: Vec<char>,
    long_run_len: usize,
}

impl BoundaryRules {
    pub fn new(sentence_end: &str, force_break: &str, long_run_len: usize) -> Self {
        Self {
            sentence_end: sentence_end.chars().collect(),
            force_break: force_break.chars().collect(),
            long_run_len,
        }
    }

    pub fn ends_sentence(&self, word: &Word) -> bool {
        word.trailing_char()
            .is_some_and(|c| self.sentence_end.contains(&c))
    }

    pub fn forces_break(&self, word: &Word) -> bool {
        word.trailing_char()
            .is_some_and(|c| self.force_break.contains(&c))
    }

    fn last_sentence_end(&self, words: &[Word]) -> Option<usize> {
        words.iter().rposition(|w| self.ends_sentence(w))
    }
}

impl Default for BoundaryRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENTENCE_END_PUNCTUATION,
            DEFAULT_FORCE_BREAK_PUNCTUATION,
            DEFAULT_LONG_RUN_LEN,
        )
    }
}

pub const DEFAULT_SENTENCE_END_PUNCTUATION: &str = ".?!。？！,;:，；：";
pub const DEFAULT_FORCE_BREAK_PUNCTUATION: &str = ".?!。？！;:；：";
/// Buffers longer than this split at their last sentence-ending punctuation
pub const DEFAULT_LONG_RUN_LEN: usize = 10;

/// Why a ready segment left the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    /// Buffer grew past the long-run length and had seen punctuation
    LongRun,
    /// Current word ended in force-break punctuation
    ForceBreak,
    /// End of the word stream
    EndOfStream,
}

/// Words that left the pending buffer together
#[derive(Debug, Clone, PartialEq)]
pub struct ReadySegment {
    pub words: Vec<Word>,
    pub reason: BreakReason,
}

/// Words accumulated since the last cue boundary.
///
/// `last_punct` is the buffer-local index of the most recent word ending in
/// sentence-ending punctuation, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBuffer {
    words: Vec<Word>,
    last_punct: Option<usize>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn last_punct(&self) -> Option<usize> {
        self.last_punct
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Apply one word and return the next state plus any segment it released.
    pub fn step(mut self, word: Word, rules: &BoundaryRules) -> (Self, Option<ReadySegment>) {
        let forces_break = rules.forces_break(&word);
        if rules.ends_sentence(&word) {
            self.last_punct = Some(self.words.len());
        }
        self.words.push(word);

        if self.words.len() > rules.long_run_len {
            if let Some(cut) = self.last_punct {
                let rest = self.words.split_off(cut + 1);
                let ready = std::mem::replace(&mut self.words, rest);
                self.last_punct = rules.last_sentence_end(&self.words);
                return (
                    self,
                    Some(ReadySegment {
                        words: ready,
                        reason: BreakReason::LongRun,
                    }),
                );
            }
        }

        if forces_break {
            let ready = std::mem::take(&mut self.words);
            self.last_punct = None;
            return (
                self,
                Some(ReadySegment {
                    words: ready,
                    reason: BreakReason::ForceBreak,
                }),
            );
        }

        (self, None)
    }

    /// Release whatever is left at end of stream.
    pub fn finish(self) -> Option<ReadySegment> {
        if self.words.is_empty() {
            None
        } else {
            Some(ReadySegment {
                words: self.words,
                reason: BreakReason::EndOfStream,
            })
        }
    }
}
