//! Locating videos and the subtitle files that belong to them.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{DualsubError, Result};

/// Extensions probed, in order, when resolving a video by stem
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "flv", "avi"];

/// Extensions accepted when listing a video directory
pub const LISTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "flv", "avi", "mov", "m4v"];

/// Find `<stem>.<ext>` in `dir`, trying [`VIDEO_EXTENSIONS`] in order.
pub fn find_video(dir: &Path, stem: &str) -> Result<PathBuf> {
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            DualsubError::NotFound(format!(
                "no video named '{}' in {} (tried {})",
                stem,
                dir.display(),
                VIDEO_EXTENSIONS.join(", ")
            ))
        })
}

/// Resolve a command-line video argument.
///
/// An existing path is used as-is; anything else is treated as a stem to
/// look up in `video_dir`.
pub fn resolve_video(input: &Path, video_dir: &Path) -> Result<PathBuf> {
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    find_video(video_dir, &input.to_string_lossy())
}

/// Video files directly inside `dir`, sorted by path.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DualsubError::NotFound(format!("video directory {}", dir.display())));
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| has_video_extension(path))
        .collect();
    videos.sort();

    info!("Found {} video files in {}", videos.len(), dir.display());
    Ok(videos)
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| LISTED_VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lowercased name with everything but letters, digits and `_` removed
pub fn simplify_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Locate the transcript for `video` in `subtitle_dir`.
///
/// `<stem>.srt` wins when present. Otherwise the first `.srt` (in sorted
/// order) whose simplified stem equals the video's simplified stem is used.
pub fn find_subtitle_for_video(subtitle_dir: &Path, video: &Path) -> Result<PathBuf> {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| DualsubError::NotFound(format!("invalid video path {}", video.display())))?;

    let exact = subtitle_dir.join(format!("{}.srt", stem));
    if exact.is_file() {
        return Ok(exact);
    }

    let not_found = || {
        DualsubError::NotFound(format!(
            "subtitle for '{}' in {}",
            stem,
            subtitle_dir.display()
        ))
    };
    if !subtitle_dir.is_dir() {
        return Err(not_found());
    }

    let wanted = simplify_name(&stem);
    let mut candidates: Vec<PathBuf> = WalkDir::new(subtitle_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| path.extension().map(|ext| ext == "srt").unwrap_or(false))
        .collect();
    candidates.sort();

    let found = candidates.into_iter().find(|path| {
        path.file_stem()
            .map(|s| simplify_name(&s.to_string_lossy()) == wanted)
            .unwrap_or(false)
    });

    match found {
        Some(path) => {
            debug!("Fuzzy subtitle match for '{}': {}", stem, path.display());
            Ok(path)
        }
        None => Err(not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn test_find_video_follows_extension_order() {
        let dir = TempDir::new().unwrap();
        dir.child("talk.webm").touch().unwrap();
        dir.child("talk.mkv").touch().unwrap();

        assert_eq!(find_video(dir.path(), "talk").unwrap(), dir.path().join("talk.mkv"));
        assert!(matches!(find_video(dir.path(), "other"), Err(DualsubError::NotFound(_))));
    }

    #[test]
    fn test_find_video_ignores_unprobed_extensions() {
        let dir = TempDir::new().unwrap();
        dir.child("clip.mov").touch().unwrap();
        assert!(find_video(dir.path(), "clip").is_err());
    }

    #[test]
    fn test_resolve_video_path_or_stem() {
        let dir = TempDir::new().unwrap();
        dir.child("talk.mp4").touch().unwrap();
        let direct = dir.path().join("talk.mp4");

        assert_eq!(resolve_video(&direct, Path::new("elsewhere")).unwrap(), direct);
        assert_eq!(resolve_video(Path::new("talk"), dir.path()).unwrap(), direct);
        assert!(resolve_video(Path::new("missing"), dir.path()).is_err());
    }

    #[test]
    fn test_list_videos_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        dir.child("b.MP4").touch().unwrap();
        dir.child("a.mov").touch().unwrap();
        dir.child("notes.txt").touch().unwrap();
        dir.child("nested/c.mp4").touch().unwrap();

        let videos = list_videos(dir.path()).unwrap();
        assert_eq!(videos, vec![dir.path().join("a.mov"), dir.path().join("b.MP4")]);
    }

    #[test]
    fn test_list_videos_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            list_videos(&dir.path().join("absent")),
            Err(DualsubError::NotFound(_))
        ));
    }

    #[test]
    fn test_simplify_name() {
        assert_eq!(simplify_name("My Talk - Part 1!"), "mytalkpart1");
        assert_eq!(simplify_name("snake_Case"), "snake_case");
        assert_eq!(simplify_name("演讲 一"), "演讲一");
    }

    #[test]
    fn test_exact_subtitle_preferred() {
        let dir = TempDir::new().unwrap();
        dir.child("My Talk.srt").touch().unwrap();
        dir.child("mytalk.srt").touch().unwrap();

        let found = find_subtitle_for_video(dir.path(), Path::new("video/My Talk.mp4")).unwrap();
        assert_eq!(found, dir.path().join("My Talk.srt"));
    }

    #[test]
    fn test_fuzzy_subtitle_match() {
        let dir = TempDir::new().unwrap();
        dir.child("my-talk!.srt").touch().unwrap();
        dir.child("mytalk.txt").touch().unwrap();

        let found = find_subtitle_for_video(dir.path(), Path::new("video/My Talk.mp4")).unwrap();
        assert_eq!(found, dir.path().join("my-talk!.srt"));
    }

    #[test]
    fn test_subtitle_not_found() {
        let dir = TempDir::new().unwrap();
        dir.child("unrelated.srt").touch().unwrap();
        assert!(matches!(
            find_subtitle_for_video(dir.path(), Path::new("x/My Talk.mp4")),
            Err(DualsubError::NotFound(_))
        ));
        assert!(matches!(
            find_subtitle_for_video(&dir.path().join("missing"), Path::new("My Talk.mp4")),
            Err(DualsubError::NotFound(_))
        ));
    }
}
