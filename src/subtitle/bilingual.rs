use super::Cue;
use crate::error::{DualsubError, Result};
use crate::segment::normalize_whitespace;

/// Two parallel tracks cut from bilingual cues.
///
/// `first` carries the line before the break, `second` everything after it.
/// Both tracks keep the index and timing of the cue they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BilingualTracks {
    pub first: Vec<Cue>,
    pub second: Vec<Cue>,
}

/// Stack `translation` under the original text of `cue`.
///
/// Both sides are flattened to one line so the stacked cue splits back
/// unambiguously.
pub fn compose_bilingual(cue: &Cue, translation: &str) -> Cue {
    let original = normalize_whitespace(&cue.text);
    let translated = normalize_whitespace(translation);
    cue.with_text(format!("{}\n{}", original, translated))
}

/// Split bilingual cues into their two tracks.
///
/// A cue without a line break is a format error naming its index.
pub fn split_bilingual(cues: &[Cue]) -> Result<BilingualTracks> {
    let mut tracks = BilingualTracks {
        first: Vec::with_capacity(cues.len()),
        second: Vec::with_capacity(cues.len()),
    };

    for cue in cues {
        let (first, second) = cue.text.split_once('\n').ok_or_else(|| {
            DualsubError::Format(format!(
                "cue {} has no line break, not a bilingual cue",
                cue.index
            ))
        })?;
        tracks.first.push(cue.with_text(first.trim_end_matches('\r')));
        tracks.second.push(cue.with_text(second));
    }

    Ok(tracks)
}
