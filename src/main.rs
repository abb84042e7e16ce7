use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

mod boundary_simplifier;
mod record_filter;

use boundary_simplifier::{BoundarySimplifier, SimplifyConfig};
use record_filter::{RecordFilter, RecordSource};

#[derive(Parser)]
#[command(name = "sisser_pipeline")]
#[command(about = "Prepare SISSER rural insurance snapshots for the analytics stage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Filter the raw policy export into a Parquet snapshot
    Records(RecordsArgs),
    /// Simplify the state boundaries into a GeoJSON snapshot
    Boundaries(BoundariesArgs),
    /// Run both stages
    All {
        #[command(flatten)]
        records: RecordsArgs,
        #[command(flatten)]
        boundaries: BoundariesArgs,
    },
}

#[derive(Args)]
struct RecordsArgs {
    /// Raw export, as a local path or an http(s) URL
    #[arg(long, default_value = record_filter::DEFAULT_SOURCE)]
    source: String,

    /// Parquet snapshot to write
    #[arg(long, default_value = record_filter::DEFAULT_OUTPUT)]
    records_output: PathBuf,
}

#[derive(Args)]
struct BoundariesArgs {
    /// Shapefile or GeoJSON with the state outlines
    #[arg(long, default_value = boundary_simplifier::DEFAULT_INPUT)]
    shapes: PathBuf,

    /// GeoJSON snapshot to write
    #[arg(long, default_value = boundary_simplifier::DEFAULT_OUTPUT)]
    boundaries_output: PathBuf,

    /// Simplification tolerance in coordinate units
    #[arg(long, default_value_t = 0.01)]
    tolerance: f64,
}

fn filter_records(args: &RecordsArgs) -> Result<()> {
    info!("filtering records from {}", args.source);
    let df = RecordFilter::new(RecordSource::parse(&args.source), args.records_output.clone()).run()?;
    println!(
        "Records snapshot: {} ({} rows)",
        args.records_output.display(),
        df.height()
    );
    Ok(())
}

fn simplify_boundaries(args: &BoundariesArgs) -> Result<()> {
    info!("simplifying boundaries from {}", args.shapes.display());
    let simplifier = BoundarySimplifier::new(SimplifyConfig {
        tolerance: args.tolerance,
        ..SimplifyConfig::default()
    })?;
    let boundaries = simplifier.run(&args.shapes, &args.boundaries_output)?;
    println!(
        "Boundary snapshot: {} ({} states)",
        args.boundaries_output.display(),
        boundaries.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Records(args) => filter_records(args)?,
        Command::Boundaries(args) => simplify_boundaries(args)?,
        Command::All {
            records,
            boundaries,
        } => {
            filter_records(records)?;
            simplify_boundaries(boundaries)?;
        }
    }

    Ok(())
}
