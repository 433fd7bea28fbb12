use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use kodiaq_absorbers::{PipelineConfig, run_catalog};

#[derive(Parser, Debug)]
#[command(
    name = "kodiaq-absorbers",
    about = "Re-fit catalogued absorbers and tabulate per-ion column densities"
)]
struct Args {
    /// Fit catalog (whitespace ASCII table, .csv, .json or .parquet).
    #[arg(long, default_value = "tab_fit_result.txt")]
    catalog: PathBuf,
    /// Directory receiving the summary and per-ion tables.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// JSON configuration overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Process sightlines in parallel.
    #[arg(long)]
    parallel: bool,
    /// Log per-component details.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.parallel {
        config.parallel = true;
    }

    let tables = run_catalog(&args.catalog, &args.output_dir, &config)?;
    info!(
        "done: {} sightlines written to {}",
        tables.summary.len(),
        args.output_dir.display()
    );
    Ok(())
}
