use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "talk2landing",
    about = "Talk to Landing - turn a recorded talk into a thought-leadership landing page",
    version,
    long_about = "Fetches a transcript for a hosted talk (captions first, speech-to-text as a fallback), then extracts a structured framework from it with a language model. Runs as a one-shot CLI or as an HTTP API."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript for a video
    Transcript {
        /// Video URL or 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        video: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Use a transcript from a file instead of fetching one
        #[arg(long, value_name = "FILE")]
        manual: Option<PathBuf>,
    },

    /// Fetch a transcript and extract the landing page framework
    Generate {
        /// Video URL or 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        video: String,

        /// User the generation is counted against
        #[arg(short, long, env = "TALK2LANDING_USER")]
        user: String,

        /// Use a transcript from a file instead of fetching one
        #[arg(long, value_name = "FILE")]
        manual: Option<PathBuf>,

        /// Write the framework JSON here (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show remaining generations for a user
    Usage {
        #[arg(short, long, env = "TALK2LANDING_USER")]
        user: String,
    },

    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with segments and metadata
    Json,
    /// SRT subtitle format
    Srt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transcript_command() {
        let cli = Cli::try_parse_from([
            "talk2landing",
            "transcript",
            "https://youtu.be/dQw4w9WgXcQ",
            "--format",
            "srt",
            "--json-logs",
        ])
        .unwrap();

        assert!(cli.json_logs);
        match cli.command {
            Commands::Transcript { video, format, manual, .. } => {
                assert_eq!(video, "https://youtu.be/dQw4w9WgXcQ");
                assert_eq!(format, OutputFormat::Srt);
                assert!(manual.is_none());
            }
            _ => panic!("expected transcript command"),
        }
    }

    #[test]
    fn test_generate_requires_user() {
        std::env::remove_var("TALK2LANDING_USER");
        assert!(Cli::try_parse_from(["talk2landing", "generate", "dQw4w9WgXcQ"]).is_err());
        assert!(Cli::try_parse_from(["talk2landing", "generate", "dQw4w9WgXcQ", "--user", "u1"]).is_ok());
    }
}
