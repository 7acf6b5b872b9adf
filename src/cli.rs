use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peakprint", about = "Index audio tracks and recognize clips by acoustic fingerprint")]
pub struct Cli {
    /// Config file (TOML). Defaults to ./peakprint.toml or the user config dir.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Fingerprint database file
    #[arg(long, global = true, default_value = "peakprint.db.json")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fingerprint audio files and add them to the database
    Index {
        /// Audio files (WAV, MP3, FLAC, OGG)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Track id to store (single file only; defaults to the file stem)
        #[arg(long)]
        id: Option<String>,
    },

    /// Identify an audio clip against the database
    Recognize {
        /// Audio clip to identify
        file: PathBuf,

        /// Show the N best candidates instead of only the winner
        #[arg(long, value_parser = parse_top)]
        top: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a track from the database
    Remove {
        track_id: String,
    },

    /// Print database statistics
    Stats,
}

fn parse_top(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
