//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sightline - chat with a vision backend about satellite imagery
#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides SIGHTLINE_BACKEND_URL and the config file)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default)
    Chat {
        /// Image to upload before the first question
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Query the backend warm-up status once and exit
    Status,
}
