use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::config::TrackStyle;
use crate::error::{DualsubError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Process handle for this command; the child dies with its owner.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args).kill_on_drop(true);
        cmd
    }

    /// Execute the command and return its standard output
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = self
            .to_command()
            .output()
            .await
            .map_err(|e| {
                DualsubError::Muxing(format!("Failed to execute {}: {}", self.binary_path, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DualsubError::Muxing(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Encoder choice derived from the input container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProfile {
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    /// Output extension without the dot
    pub extension: &'static str,
}

impl CodecProfile {
    pub fn for_input(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let (video_codec, extension) = match ext.as_str() {
            "mp4" | "mov" | "m4v" => ("libx264", "mp4"),
            "webm" => ("libvpx-vp9", "webm"),
            "mkv" => ("libx264", "mkv"),
            "flv" => ("flv", "flv"),
            "avi" => ("mpeg4", "avi"),
            _ => ("libx264", "mp4"),
        };
        let audio_codec = if extension == "webm" { "libopus" } else { "aac" };

        Self {
            video_codec,
            audio_codec,
            extension,
        }
    }

    /// `output_base` with this profile's extension appended
    pub fn output_path(&self, output_base: &Path) -> PathBuf {
        let mut path = output_base.as_os_str().to_owned();
        path.push(".");
        path.push(self.extension);
        PathBuf::from(path)
    }
}

/// Escape a value embedded in a filter option inside a filtergraph.
///
/// Two levels apply: option values (`:` and `'` are special) and the graph
/// itself (`[`, `]`, `,`, `;`). Backslashes become forward slashes first,
/// which ffmpeg accepts on every platform.
pub fn escape_filter_value(value: &str) -> String {
    let normalized = value.replace('\\', "/");

    let mut option_level = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        if matches!(c, ':' | '\'') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

/// Build the `subtitles` filter for one burned track
pub fn subtitle_filter(
    subtitle_path: &Path,
    style: &TrackStyle,
    font_file: Option<&Path>,
) -> String {
    let mut filter = format!("subtitles={}", escape_filter_value(&subtitle_path.to_string_lossy()));
    let mut force_style = Vec::new();

    if let Some(font) = font_file {
        if let Some(dir) = font.parent().filter(|d| !d.as_os_str().is_empty()) {
            filter.push_str(&format!(":fontsdir={}", escape_filter_value(&dir.to_string_lossy())));
        }
        if let Some(name) = font.file_stem().map(|s| s.to_string_lossy()) {
            let name: String = name
                .chars()
                .filter(|c| !matches!(c, ',' | '\'' | ':' | '\\'))
                .collect();
            force_style.push(format!("FontName={}", name));
        }
    }

    force_style.push(format!("PrimaryColour={}", style.color));
    force_style.push(format!("FontSize={}", style.font_size));
    force_style.push(format!("MarginV={}", style.margin_v));
    force_style.push("Italic=1".to_string());

    filter.push_str(&format!(":force_style='{}'", force_style.join(",")));
    filter
}

/// One subtitle track to burn into a video
#[derive(Debug, Clone, Copy)]
pub struct BurnRequest<'a> {
    pub video: &'a Path,
    pub subtitles: &'a Path,
    /// Output path without extension; the codec profile picks it
    pub output_base: &'a Path,
    pub style: &'a TrackStyle,
    pub font_file: Option<&'a Path>,
}

impl BurnRequest<'_> {
    pub fn profile(&self) -> CodecProfile {
        CodecProfile::for_input(self.video)
    }

    pub fn output_path(&self) -> PathBuf {
        self.profile().output_path(self.output_base)
    }
}

/// Builder for common media processing operations
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, ffprobe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build the subtitle burn command for `request`
    pub fn burn_subtitles(
        &self,
        request: &BurnRequest<'_>,
        extra_options: &[String],
    ) -> MediaCommand {
        let profile = request.profile();
        MediaCommand::new(&self.binary_path, "Subtitle burn")
            .input(request.video)
            .video_filter(subtitle_filter(request.subtitles, request.style, request.font_file))
            .video_codec(profile.video_codec)
            .args(extra_options.iter().cloned())
            .audio_codec(profile.audio_codec)
            .overwrite()
            .output(request.output_path())
    }

    /// Build audio extraction command (16 kHz mono PCM for whisper)
    pub fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Build the container duration probe
    pub fn probe_duration(&self, media_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(media_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

/// Parse ffprobe's bare `format=duration` output
pub fn parse_probe_duration(stdout: &str) -> Result<f64> {
    let value = stdout.trim();
    let duration: f64 = value.parse().map_err(|_| {
        DualsubError::Muxing(format!("ffprobe returned no usable duration: '{}'", value))
    })?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(DualsubError::Muxing(format!(
            "ffprobe returned invalid duration: {}",
            duration
        )));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssColor;

    fn style(color: &str, font_size: u32, margin_v: u32) -> TrackStyle {
        TrackStyle {
            color: color.parse::<AssColor>().unwrap(),
            font_size,
            margin_v,
        }
    }

    fn extra() -> Vec<String> {
        ["-crf", "23", "-preset", "ultrafast"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_codec_profile_by_extension() {
        let cases = [
            ("a.mp4", "libx264", "aac", "mp4"),
            ("a.MOV", "libx264", "aac", "mp4"),
            ("a.m4v", "libx264", "aac", "mp4"),
            ("a.webm", "libvpx-vp9", "libopus", "webm"),
            ("a.mkv", "libx264", "aac", "mkv"),
            ("a.flv", "flv", "aac", "flv"),
            ("a.avi", "mpeg4", "aac", "avi"),
            ("a.ts", "libx264", "aac", "mp4"),
            ("noext", "libx264", "aac", "mp4"),
        ];
        for (file, video, audio, ext) in cases {
            let profile = CodecProfile::for_input(Path::new(file));
            assert_eq!(profile.video_codec, video, "{}", file);
            assert_eq!(profile.audio_codec, audio, "{}", file);
            assert_eq!(profile.extension, ext, "{}", file);
        }
    }

    #[test]
    fn test_output_path_appends_extension() {
        let profile = CodecProfile::for_input(Path::new("clip.mov"));
        assert_eq!(
            profile.output_path(Path::new("video/clip_pass1")),
            PathBuf::from("video/clip_pass1.mp4")
        );
        assert_eq!(
            profile.output_path(Path::new("video/v1.2_en_zh")),
            PathBuf::from("video/v1.2_en_zh.mp4")
        );
    }

    #[test]
    fn test_subtitle_filter_without_font() {
        let filter = subtitle_filter(
            Path::new("outsrt/talk.en.srt"),
            &style("&H0000FFFF", 13, 38),
            None,
        );
        assert_eq!(
            filter,
            "subtitles=outsrt/talk.en.srt:\
             force_style='PrimaryColour=&H0000FFFF,FontSize=13,MarginV=38,Italic=1'"
        );
    }

    #[test]
    fn test_subtitle_filter_with_font() {
        let filter = subtitle_filter(
            Path::new("outsrt/talk.zh.srt"),
            &style("&H00FFFF00", 12, 14),
            Some(Path::new("fonts/NotoSansSC.ttf")),
        );
        assert_eq!(
            filter,
            "subtitles=outsrt/talk.zh.srt:fontsdir=fonts:force_style='FontName=NotoSansSC,\
             PrimaryColour=&H00FFFF00,FontSize=12,MarginV=14,Italic=1'"
        );
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain/path.srt"), "plain/path.srt");
        assert_eq!(escape_filter_value(r"C:\subs\a.srt"), r"C\\:/subs/a.srt");
        assert_eq!(escape_filter_value("it's,[x].srt"), r"it\\\'s\,\[x\].srt");
    }

    #[test]
    fn test_burn_command_layout() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let style = style("&H00FFFF00", 12, 14);
        let request = BurnRequest {
            video: Path::new("video/talk.webm"),
            subtitles: Path::new("outsrt/talk.zh.srt"),
            output_base: Path::new("video/talk_pass1"),
            style: &style,
            font_file: None,
        };
        assert_eq!(request.output_path(), PathBuf::from("video/talk_pass1.webm"));
        let cmd = builder.burn_subtitles(&request, &extra());

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-i",
                "video/talk.webm",
                "-vf",
                "subtitles=outsrt/talk.zh.srt:\
                 force_style='PrimaryColour=&H00FFFF00,FontSize=12,MarginV=14,Italic=1'",
                "-c:v",
                "libvpx-vp9",
                "-crf",
                "23",
                "-preset",
                "ultrafast",
                "-c:a",
                "libopus",
                "-y",
                "video/talk_pass1.webm",
            ]
        );
    }

    #[test]
    fn test_extract_audio_command() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.extract_audio(Path::new("in.mkv"), Path::new("/tmp/in.wav"));
        assert_eq!(
            cmd.args,
            vec![
                "-i", "in.mkv", "-vn", "-c:a", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y",
                "/tmp/in.wav"
            ]
        );
    }

    #[test]
    fn test_probe_command_and_parse() {
        let builder = MediaCommandBuilder::new("ffmpeg", "/opt/ffprobe");
        let cmd = builder.probe_duration(Path::new("in.mp4"));
        assert_eq!(cmd.binary_path, "/opt/ffprobe");
        assert_eq!(cmd.args.last().map(String::as_str), Some("in.mp4"));

        assert_eq!(parse_probe_duration("125.480000\n").unwrap(), 125.48);
        assert!(parse_probe_duration("N/A\n").is_err());
        assert!(parse_probe_duration("").is_err());
        assert!(parse_probe_duration("0.0").is_err());
    }
}
