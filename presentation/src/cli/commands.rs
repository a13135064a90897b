//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for panel run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every step, the best steps and the final consensus
    Full,
    /// Only the final consensus
    Summary,
    /// JSON output
    Json,
}

/// CLI arguments for diagnostic-panel
#[derive(Parser, Debug)]
#[command(name = "diagnostic-panel")]
#[command(
    author,
    version,
    about = "Diagnostic panel - a simulated clinical panel reasons over a case"
)]
#[command(long_about = r#"
Diagnostic Panel runs a five-persona clinical panel over one patient case.

Each step the panel chooses one action:
  ASK     clarifying questions for the patient
  ORDER   diagnostic tests (after the stewardship veto)
  COMMIT  a final diagnosis

The run stops when the panel commits with enough certainty, when certainty
stops moving, or when the step budget runs out.

Configuration files are loaded from (in priority order):
1. PANEL_* environment variables (e.g. PANEL_PANEL__MAX_STEPS=10)
2. --config <path>     Explicit config file
3. ./panel.toml        Project-level config
4. ~/.config/diagnostic-panel/config.toml   Global config

Example:
  diagnostic-panel --case-file cases/cough.json
  diagnostic-panel --database panel.db --case-id case-42 --threshold 0.9
  diagnostic-panel --case-file cases/cough.json --seed 7 -o json
"#)]
pub struct Cli {
    /// JSON case file ({"id", "symptoms", "labs", "history"})
    #[arg(long, value_name = "PATH")]
    pub case_file: Option<PathBuf>,

    /// SQLite database holding cases and flow history
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Case to run (defaults to the case file's id)
    #[arg(long, value_name = "ID")]
    pub case_id: Option<String>,

    /// Step budget for the run (clamped to 1..=30)
    #[arg(long, value_name = "N")]
    pub max_steps: Option<u32>,

    /// Certainty at which a COMMIT finishes the flow
    #[arg(long, value_name = "CERTAINTY")]
    pub threshold: Option<f64>,

    /// Seed for reproducible exploration
    #[arg(long)]
    pub seed: Option<u64>,

    /// Model name sent to the oracle endpoint
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Chat-completions base URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append audit events (JSONL) to this file
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,
}
