//! CLI argument parsing for Deriva

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for batch reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON report for machine parsing (default)
    Json,
    /// Human-readable text summary
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "deriva")]
#[command(version)]
#[command(about = "Streaming performance trend detector", long_about = None)]
pub struct Cli {
    /// Payload file in JSON Lines format, one measurement per line
    #[arg(value_name = "PAYLOADS")]
    pub payloads: PathBuf,

    /// State file for resuming detector state between runs
    #[arg(short = 's', long = "state", value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Detector settings TOML file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Minimum observations before classifications are emitted
    #[arg(long = "min-data-points", value_name = "N")]
    pub min_data_points: Option<u64>,

    /// Minimum relative change to classify as regressed/improved
    #[arg(long = "threshold", value_name = "RATIO")]
    pub threshold: Option<f64>,

    /// Short (fast) moving-average window span
    #[arg(long = "short-span", value_name = "SPAN")]
    pub short_span: Option<u32>,

    /// Long (slow) moving-average window span
    #[arg(long = "long-span", value_name = "SPAN")]
    pub long_span: Option<u32>,

    /// Worker threads for processing entities in parallel
    #[arg(long = "workers", value_name = "N", default_value = "1")]
    pub workers: usize,

    /// Skip entities with undecodable persisted state instead of
    /// resetting them to fresh state
    #[arg(long = "skip-corrupt-state")]
    pub skip_corrupt_state: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}
