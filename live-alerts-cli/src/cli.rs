use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "live-alerts")]
#[command(about = "Show live stream follower, subscriber and rant alerts in an overlay")]
#[command(version)]
pub struct Args {
    /// Config file path (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "LIVE_ALERTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the stream and rotate alerts until Ctrl-C (default)
    Run {
        /// Live Stream API URL, overriding the config file
        #[arg(long, env = "LIVE_ALERTS_API_URL", hide_env_values = true)]
        api_url: Option<String>,

        /// Refresh interval in seconds, overriding the config file
        #[arg(long)]
        refresh: Option<u64>,

        /// Alert on events that were pending before startup
        #[arg(long)]
        include_backlog: bool,
    },

    /// List scenes, text sources and sub-scenes of the overlay layout
    Scenes,

    /// Validate the configuration and check which alerts are bound
    Check,

    /// Manage the configuration file
    Config {
        /// Print the current configuration
        #[arg(long)]
        show: bool,

        /// Reset the configuration to defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,

        /// Write a default configuration if none exists
        #[arg(long, conflicts_with_all = ["show", "reset"])]
        init: bool,
    },
}
