use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::router::Outcome;

#[derive(Parser, Debug)]
#[command(
    name = "bypass-router",
    about = "Route article URLs to paywall bypass services, learning from reported outcomes",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to the state store (`:memory:` for a throwaway session)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Path to a custom domain to service map file
    #[arg(long, global = true)]
    pub services: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pick a bypass service for a URL and print the redirect target
    Route {
        /// Article URL; `https://` is assumed when no scheme is given
        url: String,
    },

    /// Report whether the last redirect for a URL worked
    Feedback {
        url: String,

        #[arg(value_enum)]
        outcome: Outcome,

        /// Service that was used (defaults to the one last routed for this URL)
        #[arg(long)]
        service: Option<String>,
    },

    /// Show aggregated bypass statistics
    Stats {
        /// Number of top domains to display
        #[arg(short, long, default_value_t = 5)]
        top: usize,

        /// Redact domain names for privacy
        #[arg(long)]
        redact: bool,
    },

    /// List recently routed URLs
    Recent,

    /// Forget all cached per-URL results
    ClearCache,

    /// Initialize service_map.txt with the default service map
    Init,
}
