//! Stages command - List registered stages.

use anyhow::Result;
use clap::Args;

use ember_stages::default_registry;

#[derive(Args)]
pub struct StagesArgs {
    /// Print the names as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: StagesArgs) -> Result<()> {
    let names = default_registry()?.names();

    if args.json {
        println!("{}", serde_json::to_string(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}
