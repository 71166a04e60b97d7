//! Merges the staged CDC changes into the SCD1 and SCD2 tables.
//!
//! One run optionally loads the snapshot table, reads the whole stage table, merges it into the
//! selected targets, prints one JSON summary per target on stdout and exits non-zero on any
//! failure.

use std::process::ExitCode;

use clap::Parser;
use scd_config::shared::MergerConfig;
use scd_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_merger_config;
use crate::core::{RunOptions, TargetArg, resolve_targets, start_merger_with_config};
use crate::error::{MergerError, MergerResult};

mod config;
mod core;
mod error;

#[derive(Parser, Debug)]
#[command(name = "scd-merger")]
#[command(about = "Merges staged CDC changes into SCD1 and SCD2 tables")]
struct Args {
    /// Targets to merge into. Defaults to the configured targets.
    #[arg(long, value_enum)]
    target: Option<TargetArg>,

    /// Create the schema and tables if they are missing.
    #[arg(long)]
    init: bool,

    /// Load the configured snapshot table into the targets before merging.
    #[arg(long)]
    load_snapshot: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> MergerResult<()> {
    let args = Args::parse();
    let config = load_merger_config()?;

    init_tracing(env!("CARGO_BIN_NAME")).map_err(MergerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config, args))
}

async fn async_main(config: MergerConfig, args: Args) -> MergerResult<()> {
    let targets = resolve_targets(args.target, &config.merge.targets);
    let options = RunOptions {
        init: args.init,
        load_snapshot: args.load_snapshot,
    };
    info!(?targets, ?options, "starting merger");

    let summaries = match start_merger_with_config(config, targets, options).await {
        Ok(summaries) => summaries,
        Err(err) => {
            error!("{err}");
            return Err(err);
        }
    };

    for summary in &summaries {
        let json = serde_json::to_string(summary).map_err(std::io::Error::from)?;
        println!("{json}");
    }

    Ok(())
}
