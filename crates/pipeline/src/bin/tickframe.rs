//! Run the tick-to-bar pipeline from a JSON config file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tickframe_core::RunConfig;

#[derive(Debug, Parser)]
#[command(name = "tickframe", about = "Batch tick-to-bar aggregation")]
struct Args {
    /// Path to the JSON run configuration.
    #[arg(short, long)]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let config = RunConfig::from_json(&text)?;

    match tickframe_pipeline::run(config) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(error) => {
            eprintln!("{}: {error}", error.code());
            Err(error.into())
        }
    }
}
