use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info};

use super::Cue;
use crate::error::{DualsubError, Result};

static TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("valid SRT timestamp regex")
});

/// Format time in seconds to SRT time format (HH:MM:SS,mmm).
///
/// Sub-millisecond remainders are truncated. A tolerance far below one
/// millisecond keeps values such as `0.29` (stored as 0.28999...) on their
/// intended millisecond.
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0 + 1e-6) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Serialize cues in order; every block ends with one blank line.
///
/// Blank lines inside cue text would end the block early, so they are dropped.
pub fn serialize_srt(cues: &[Cue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            block_text(&cue.text)
        ));
    }

    srt_content
}

fn block_text(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse SRT content into cues.
///
/// Blocks are separated by blank lines. Each block needs an index line, a
/// timestamp line and at least one text line; `end < start` is rejected.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut cues = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut block_line = 0;

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim_end();
        if line.is_empty() {
            if !block.is_empty() {
                cues.push(parse_block(&block, block_line)?);
                block.clear();
            }
            continue;
        }
        if block.is_empty() {
            block_line = line_no + 1;
        }
        block.push(line);
    }
    if !block.is_empty() {
        cues.push(parse_block(&block, block_line)?);
    }

    debug!("Parsed {} SRT blocks", cues.len());
    Ok(cues)
}

fn parse_block(lines: &[&str], line_no: usize) -> Result<Cue> {
    let index_line = lines[0].trim_start();
    let index: usize = index_line.parse().map_err(|_| {
        DualsubError::Format(format!(
            "block at line {}: expected cue index, found '{}'",
            line_no, index_line
        ))
    })?;

    let timing_line = lines
        .get(1)
        .ok_or_else(|| {
            DualsubError::Format(format!(
                "cue {} (line {}): missing timestamp line",
                index, line_no
            ))
        })?
        .trim_start();
    let caps = TIMESTAMP_REGEX.captures(timing_line).ok_or_else(|| {
        DualsubError::Format(format!(
            "cue {} (line {}): malformed timestamp line '{}'",
            index,
            line_no + 1,
            timing_line
        ))
    })?;
    let start = timestamp_seconds(&caps, 1)?;
    let end = timestamp_seconds(&caps, 5)?;
    if end < start {
        return Err(DualsubError::Format(format!(
            "cue {} (line {}): end {} is before start {}",
            index,
            line_no + 1,
            format_srt_time(end),
            format_srt_time(start)
        )));
    }

    if lines.len() < 3 {
        return Err(DualsubError::Format(format!("cue {} (line {}): missing text", index, line_no)));
    }
    let text = lines[2..].join("\n");

    Ok(Cue::new(index, start, end, text))
}

fn timestamp_seconds(caps: &regex::Captures, start_idx: usize) -> Result<f64> {
    let field = |offset: usize| -> Result<u64> {
        caps[start_idx + offset]
            .parse::<u64>()
            .map_err(|e| DualsubError::Format(format!("invalid timestamp field: {}", e)))
    };
    let hours = field(0)?;
    let minutes = field(1)?;
    let seconds = field(2)?;
    let millis = field(3)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(DualsubError::Format(format!(
            "timestamp out of range: {}:{:02}:{:02},{:03}",
            hours, minutes, seconds, millis
        )));
    }

    let total_ms = hours
        .checked_mul(3600)
        .and_then(|s| s.checked_add(minutes * 60 + seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(|| {
            DualsubError::Format(format!(
                "timestamp out of range: {}:{:02}:{:02},{:03}",
                hours, minutes, seconds, millis
            ))
        })?;
    Ok(total_ms as f64 / 1000.0)
}

/// Read and parse an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DualsubError::NotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path).await?;
    parse_srt(&content)
        .map_err(|e| DualsubError::Format(format!("{}: {}", path.display(), inner_message(e))))
}

fn inner_message(error: DualsubError) -> String {
    match error {
        DualsubError::Format(message) => message,
        other => other.to_string(),
    }
}

/// Write cues to an SRT file
pub async fn write_srt<P: AsRef<Path>>(path: P, cues: &[Cue]) -> Result<()> {
    let path = path.as_ref();
    info!("Writing SRT file: {} ({} cues)", path.display(), cues.len());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, serialize_srt(cues)).await?;

    Ok(())
}
