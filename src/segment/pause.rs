use serde::{Deserialize, Serialize};

use super::Word;

/// Bounds for the secondary split of a long ready segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSplitParams {
    /// Earliest split index (length of the shortest allowed first part)
    pub min_len: usize,
    /// Scan stops before this index
    pub max_len: usize,
}

impl PauseSplitParams {
    /// Used for segments closed by punctuation while the stream is running
    pub const STANDARD: Self = Self { min_len: 10, max_len: 30 };
    /// Used for whatever remains in the buffer at end of stream
    pub const TAIL: Self = Self { min_len: 6, max_len: 20 };
}

/// Segments of at most this many words are never pause-split
pub const DEFAULT_MAX_UNSPLIT_LEN: usize = 16;

/// Find the split index of `words`, or `None` when the segment stays whole.
///
/// Boundaries `i` in `[min_len - 1, min(len, max_len) - 1)` are scanned for
/// the gap between `words[i].end` and `words[i + 1].start`. The strictly
/// largest gap wins, so ties go to the earliest boundary. Without any
/// positive gap the split falls at `min_len`.
pub fn find_pause_split(
    words: &[Word],
    params: PauseSplitParams,
    max_unsplit_len: usize,
) -> Option<usize> {
    let len = words.len();
    if len <= max_unsplit_len {
        return None;
    }

    let scan_start = params.min_len.saturating_sub(1);
    let scan_end = len.min(params.max_len).saturating_sub(1);

    let mut max_gap = 0.0;
    let mut split_idx = params.min_len;
    for i in scan_start..scan_end {
        let gap = words[i + 1].start - words[i].end;
        if gap > max_gap {
            max_gap = gap;
            split_idx = i + 1;
        }
    }

    // Misconfigured bounds must never yield an empty part
    Some(split_idx.clamp(1, len - 1))
}

/// Split `words` at its longest pause.
///
/// Returns the first part and, if a split happened, the remainder. The
/// caller is expected to feed the remainder back in until nothing is left.
pub fn split_at_longest_pause(
    mut words: Vec<Word>,
    params: PauseSplitParams,
    max_unsplit_len: usize,
) -> (Vec<Word>, Option<Vec<Word>>) {
    match find_pause_split(&words, params, max_unsplit_len) {
        Some(idx) => {
            let rest = words.split_off(idx);
            (words, Some(rest))
        }
        None => (words, None),
    }
}
