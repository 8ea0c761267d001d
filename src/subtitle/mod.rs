// Subtitle records and the SubRip interchange format
//
// - srt: serialization, parsing and file helpers
// - bilingual: stacking a translation under its original and splitting the
//   stacked cues back into two parallel tracks

pub mod bilingual;
pub mod srt;

use serde::{Deserialize, Serialize};

pub use bilingual::{compose_bilingual, split_bilingual, BilingualTracks};
pub use srt::{format_srt_time, parse_srt, read_srt, serialize_srt, write_srt};

/// One timed subtitle record. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new<S: Into<String>>(index: usize, start: f64, end: f64, text: S) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Same timing and index, different text
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        Self {
            index: self.index,
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }
}
