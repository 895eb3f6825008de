use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crimesound")]
#[command(about = "CrimeSound AI upload queue and live-monitor simulator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Fixed seed for reproducible runs (overrides the config file)
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Config file (default: ~/.crimesound/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate uploading and classifying audio files
    Upload {
        /// Files to submit
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Media type for every file instead of guessing from the extension
        #[arg(long)]
        media_type: Option<String>,
    },

    /// Run the live detection feed
    Monitor {
        /// Stop after this many detections
        #[arg(short, long, default_value = "5")]
        detections: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        let cli = Cli::parse_from(["crimesound", "--seed", "9", "upload", "a.wav", "b.mp3"]);
        assert_eq!(cli.seed, Some(9));
        match cli.command {
            Commands::Upload { files, media_type } => {
                assert_eq!(files, vec![PathBuf::from("a.wav"), PathBuf::from("b.mp3")]);
                assert!(media_type.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_monitor_defaults() {
        let cli = Cli::parse_from(["crimesound", "monitor", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Monitor { detections: 5 }));
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(Cli::try_parse_from(["crimesound", "upload"]).is_err());
    }
}
