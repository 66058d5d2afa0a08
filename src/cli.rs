//! Command-line interface for tech-radar.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::DEFAULT_SINCE_DAYS;

/// Track emerging technologies mentioned on news sites.
///
/// ```sh
/// tech-radar add-source "Hacker Daily" https://news.example.com 1
/// tech-radar run
/// tech-radar list --min-confidence 0.8
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long, env = "TECH_RADAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Discover technologies on every source that is due
    Run {
        /// Visit every active source regardless of cadence
        #[arg(long)]
        all: bool,
    },
    /// Discover technologies on a single source (does not update last_checked)
    RunSource { id: i64 },
    /// Register a news source
    AddSource {
        name: String,
        url: String,
        /// Minimum days between checks (1-365)
        cadence_days: u32,
        description: Option<String>,
        /// Register the source as paused
        #[arg(long)]
        inactive: bool,
    },
    /// Partially update a source from a JSON object, e.g. '{"cadence_days": 3}'
    UpdateSource { id: i64, json: String },
    /// Remove a source
    DeleteSource { id: i64 },
    /// List all sources
    Sources,
    /// List sources due for a check now
    Due,
    /// List discoveries, newest first
    List {
        #[arg(long)]
        source: Option<i64>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Discoveries for a source within the last N days
    Since {
        source_id: i64,
        #[arg(default_value_t = DEFAULT_SINCE_DAYS)]
        days: i64,
    },
    /// Show one discovery in full
    Show { id: i64 },
    /// Set a discovery's review status (discovered, assessed, ignored)
    SetStatus { id: i64, status: String },
    /// Partially update a discovery from a JSON object
    Update { id: i64, json: String },
    /// Delete a discovery
    Delete { id: i64 },
    /// Summary counts by status, category and confidence
    Stats,
}
