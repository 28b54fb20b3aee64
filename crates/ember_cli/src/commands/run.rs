//! Run command - Apply and run stages against a root filesystem.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use ember_core::{
    Config, DefaultFetcher, ExecutorOptions, FetcherOptions, ProvisionState, StageExecutor,
};
use ember_stages::default_registry;

#[derive(Args)]
pub struct RunArgs {
    /// Stage to run; repeat or comma-separate to run several in order
    #[arg(short, long = "stage", required = true, value_delimiter = ',')]
    pub stages: Vec<String>,

    /// Path to the provisioning config (JSON, or YAML by extension)
    #[arg(short, long, env = "EMBER_CONFIG")]
    pub config: PathBuf,

    /// Root of the filesystem being provisioned
    #[arg(long, env = "EMBER_ROOT", default_value = "/sysroot")]
    pub root: PathBuf,

    /// Warn about and skip config entries a stage does not support
    #[arg(long)]
    pub ignore_unsupported: bool,

    /// State file shared between stage invocations
    #[arg(long, env = "EMBER_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Where to write the execution log
    #[arg(long, env = "EMBER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// HTTP fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout: u64,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let registry = Arc::new(default_registry()?);

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config.check_version()?;

    let state = match &args.state_file {
        Some(path) => ProvisionState::load(path)?,
        None => ProvisionState::new(),
    }
    .into_shared();

    let fetcher = DefaultFetcher::new(FetcherOptions {
        timeout: Duration::from_secs(args.fetch_timeout),
        ..Default::default()
    })?;

    let mut options = ExecutorOptions::new(&args.root).ignore_unsupported(args.ignore_unsupported);
    if let Some(path) = &args.log_file {
        options = options.log_path(path);
    }

    let executor = StageExecutor::new(registry, Arc::new(fetcher), Arc::clone(&state), options);

    info!("Provisioning {} with stages: {}", args.root.display(), args.stages.join(", "));
    let result = executor.execute(&args.stages, &config).await;

    // Stages that finished before a failure still left state behind.
    if let Some(path) = &args.state_file {
        if let Err(e) = state.read().await.save(path) {
            warn!("Failed to save state to {}: {}", path.display(), e);
        }
    }

    let log = result?;
    for record in &log.records {
        if record.warnings > 0 {
            println!("✅ {} ({} skipped entries)", record.name, record.warnings);
        } else {
            println!("✅ {}", record.name);
        }
    }
    Ok(())
}
