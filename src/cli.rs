use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment a saved word stream (JSON) into an SRT file
    Segment {
        /// Word stream: a JSON array of words, or whisper.cpp / OpenAI whisper output
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Media duration in seconds, for progress; defaults to the last word end
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Transcribe a video into `<stem>.srt`
    Transcribe {
        /// Video file, or a stem to look up in the video directory
        input: PathBuf,

        /// Spoken language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate a video's transcript into a bilingual `<stem>_<target>.srt`
    Translate {
        /// Video file, or a stem to look up in the video directory
        input: PathBuf,

        /// Target language code
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Split a bilingual subtitle file into one file per language
    Split {
        /// Video file, or a stem to look up in the video directory
        input: PathBuf,
    },

    /// Burn both subtitle languages into the video
    Fuse {
        /// Video file, or a stem to look up in the video directory
        input: PathBuf,

        /// Keep the single-language intermediate video
        #[arg(long)]
        keep_intermediate: bool,
    },

    /// Transcribe, translate and fuse a single video
    Process {
        /// Video file, or a stem to look up in the video directory
        input: PathBuf,

        /// Target language code
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Run every stage over all videos in a directory
    Batch {
        /// Directory containing video files (defaults to the configured one)
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Reuse existing transcripts instead of transcribing
        #[arg(long)]
        skip_transcribe: bool,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fuse() {
        let args =
            Args::try_parse_from(["dualsub", "-v", "fuse", "talk", "--keep-intermediate"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Commands::Fuse { input, keep_intermediate } => {
                assert_eq!(input, PathBuf::from("talk"));
                assert!(keep_intermediate);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_segment_with_duration() {
        let args = Args::try_parse_from([
            "dualsub", "segment", "-i", "words.json", "-o", "out.srt", "--duration", "12.5",
        ])
        .unwrap();
        match args.command {
            Commands::Segment { input, output, duration } => {
                assert_eq!(input, PathBuf::from("words.json"));
                assert_eq!(output, PathBuf::from("out.srt"));
                assert_eq!(duration, Some(12.5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_config_default_output() {
        let args = Args::try_parse_from(["dualsub", "init-config"]).unwrap();
        match args.command {
            Commands::InitConfig { output, force } => {
                assert_eq!(output, PathBuf::from("config.toml"));
                assert!(!force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["dualsub"]).is_err());
    }
}
