//! Single-cycle conformance CLI
//!
//! Runs one computation cycle over a snapshot of tracked flights.
//!
//! Usage:
//!   run-cycle --snapshot data/snapshot.json --output data/cycle_result.json --geojson

use anyhow::Result;
use clap::Parser;
use flight_conformance::{loader, ComputationCycle, CoordinateTransform, FaultPolicy};
use flight_geometry::EARTH_RADIUS_M;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "run-cycle",
    about = "Run one route conformance and trajectory prediction cycle"
)]
struct Args {
    /// Path to the cycle snapshot JSON file
    #[arg(short, long, default_value = "data/snapshot.json")]
    snapshot: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = "data/cycle_result.json")]
    output: PathBuf,

    /// Also output trajectories as GeoJSON
    #[arg(long)]
    geojson: bool,

    /// Leave flights with unfollowable routes without a trajectory
    #[arg(long)]
    omit_faults: bool,

    /// Override the snapshot's prediction horizon, seconds
    #[arg(long)]
    horizon_secs: Option<u32>,

    /// Sphere radius for the local projection, meters
    #[arg(long, default_value_t = EARTH_RADIUS_M)]
    earth_radius_m: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Flight Conformance Cycle");
    info!("{}", "=".repeat(60));

    let mut snapshot = loader::load_snapshot(&args.snapshot)?;
    if let Some(secs) = args.horizon_secs {
        snapshot.parameters = snapshot
            .parameters
            .with_time_horizon(chrono::Duration::seconds(i64::from(secs)));
    }

    let policy = if args.omit_faults {
        FaultPolicy::Omit
    } else {
        FaultPolicy::DeadReckon
    };
    if !(args.earth_radius_m.is_finite() && args.earth_radius_m > 0.0) {
        anyhow::bail!("earth radius must be finite and positive, got {}", args.earth_radius_m);
    }
    let cycle = ComputationCycle::new(CoordinateTransform::new(args.earth_radius_m))
        .with_fault_policy(policy);
    info!("Fault policy: {:?}", cycle.fault_policy());

    let result = cycle.run(&snapshot.flights, &snapshot.bounds, &snapshot.parameters);

    loader::write_result(&args.output, &result)?;

    if args.geojson {
        loader::write_geojson(args.output.with_extension("geojson"), &result)?;
    }

    // Summary
    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Flights evaluated: {}", result.flight_count());
    info!("Trajectories:      {}", result.trajectories().len());
    info!("Blundering:        {}", result.blunders().len());
    for id in result.blunders() {
        if let Some(report) = result.conformance().get(id) {
            info!("  {:12} residual {:.3}", id, report.residual);
        }
    }
    for (id, fault) in result.faults() {
        info!("  fault {:12} {}", id, fault);
    }

    Ok(())
}
