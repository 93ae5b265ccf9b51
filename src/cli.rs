use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
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

#[derive(Subcommand)]
pub enum Commands {
    /// Replace on-screen text in a single video file
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Language of the on-screen text
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Language to translate the text into
        #[arg(short, long, default_value = "es")]
        target_lang: String,
    },

    /// Replace on-screen text in every video file under a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for processed files
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Language of the on-screen text
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Language to translate the text into
        #[arg(short, long, default_value = "es")]
        target_lang: String,
    },

    /// Detect scene boundaries and print them without processing frames
    Scenes {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        /// Where to write the configuration
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
    },
}
