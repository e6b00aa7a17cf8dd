use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "magnet-watch", version, about = "Magnet cleaning reminders for bin transfers")]
pub struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, short, global = true, default_value = "magnet-watch.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch active transfers until interrupted
    Run,
    /// Evaluate all active transfers once and print the result
    Check,
    /// Record that a magnet has just been cleaned
    RecordClean {
        /// Magnet id
        #[arg(long)]
        magnet: String,
        /// Transfer session the cleaning belongs to
        #[arg(long)]
        session: Option<String>,
    },
    /// Copy transfer data from the ERP API into the configured SQLite source
    Sync {
        /// ERP API base URL; falls back to MAGNET_WATCH_API_URL
        #[arg(long)]
        from: Option<String>,
        /// Bearer token for the ERP API; falls back to MAGNET_WATCH_API_TOKEN
        #[arg(long)]
        token: Option<String>,
    },
    /// Write the current settings (defaults for a missing file) to the config path
    Init,
}
