use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::LogFormat;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ttfb",
    version,
    about = "Measure the time to first byte of a URL and search the response body"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Target URL (http:// or https://)
    #[arg(long, short, env = "TTFB_URL")]
    pub url: Option<String>,

    /// Regular expression to look for in the response body
    #[arg(long, short, env = "TTFB_SEARCH")]
    pub search: Option<String>,

    /// Use a fresh connection and DNS lookup for every measurement
    #[arg(long)]
    pub no_cache: bool,

    /// Deadline for the whole request in milliseconds
    #[arg(long, env = "TTFB_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Number of sequential measurements
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Delay between the start of consecutive measurements
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Env file holding url/search defaults (defaults to ~/.ttfbEnv)
    #[arg(long, env = "TTFB_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Fail instead of asking on stdin for missing values
    #[arg(long)]
    pub no_prompt: bool,

    /// Ignore HTTP(S)_PROXY environment variables
    #[arg(long)]
    pub no_proxy: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,

    /// Record a TTFB histogram across repeats (with --metrics)
    #[arg(long)]
    pub latency_history: bool,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version information
    Version,
}
