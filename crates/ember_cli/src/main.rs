//! ember CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Unknown stage or invalid arguments
//! - 3: Configuration rejected
//! - 4: Stage failed

use std::process::ExitCode;

use clap::Parser;
use ember_core::CoreError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

/// Exit codes reported to the boot units that invoke ember
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_REJECTED: u8 = 3;
    pub const STAGE_FAILED: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Stages(args) => commands::stages::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "ember=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "ember=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber may already be installed; keep it.
    let _ = match cli.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
}

/// Map an error onto an exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<CoreError>() {
        Some(CoreError::UnknownStage { .. }) => ExitCodes::INVALID_ARGS,
        Some(
            CoreError::InvalidConfig(_)
            | CoreError::UnsupportedVersion(_)
            | CoreError::ApplyFailed { .. },
        ) => ExitCodes::CONFIG_REJECTED,
        Some(CoreError::RunFailed { .. } | CoreError::StageNameMismatch { .. }) => {
            ExitCodes::STAGE_FAILED
        }
        _ => ExitCodes::GENERAL_ERROR,
    }
}
