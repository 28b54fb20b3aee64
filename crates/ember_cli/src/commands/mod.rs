//! CLI command definitions.
//!
//! Each subcommand maps to one entry point of the provisioning tool. Boot
//! orchestration (which stage runs in which boot phase) lives outside the
//! binary; units call `ember run --stage <name>` once per phase.

use clap::{Parser, Subcommand, ValueEnum};

pub mod run;
pub mod stages;

/// ember - boot-time provisioning
#[derive(Parser)]
#[command(name = "ember")]
#[command(version, about = "ember - boot-time provisioning stages")]
#[command(long_about = r#"
ember applies a provisioning config to a freshly booted system, one stage at
a time. Each stage validates its part of the config, then performs it.

COMMANDS:
  run     → Apply and run one or more stages against a root filesystem
  stages  → List the stages this build knows about

EXIT CODES:
  0 - Success
  1 - General error
  2 - Unknown stage or invalid arguments
  3 - Configuration rejected
  4 - Stage failed
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "EMBER_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply and run stages against a root filesystem
    Run(run::RunArgs),

    /// List registered stages
    Stages(stages::StagesArgs),
}
