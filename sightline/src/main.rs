//! sightline - conversational inspection of satellite imagery.
//!
//! Upload an image to a remote vision backend, wait for its model pipeline
//! to warm up, then ask natural-language questions and get answers grounded
//! in oriented bounding boxes drawn over the image.
//!
//! Architecture:
//! - CLI is a thin presentation shell over the library core
//! - The orchestrator owns the session store, the analyzing flag, and the
//!   readiness poller; it is the single mutator of conversation state
//! - All backend access goes through the `VisionBackend` capability trait

mod backend;
mod cli;
mod config;
mod error;
mod geometry;
mod models;
mod orchestrator;
mod readiness;
mod render;
mod store;

use anyhow::Result;
use clap::Parser;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    execute(cli).await
}
