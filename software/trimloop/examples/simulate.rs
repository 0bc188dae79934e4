//! Run the simulated engine through the correction loop and log to CSV.
//!
//! Usage: `cargo run --example simulate -- [config.json] [duration_s]`
//!
//! Demonstrated here:
//!   * Loading an engine and controller config from JSON
//!   * Composing a sensor source, an injection model and data targets
//!   * Reading the latest values while a run is summarized

use std::path::PathBuf;

use trimloop::injection::SpeedDensity;
use trimloop::sensor::SimulatedEngine;
use trimloop::*;

fn main() -> EcuResult<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EcuConfig::load(&PathBuf::from(path))?,
        None => EcuConfig::default(),
    };
    let duration_s = args.next().and_then(|s| s.parse().ok()).unwrap_or(30.0);

    let mut ctx = RunCtx::default();
    ctx.op_name = "simulate_example".into();
    ctx.op_dir = std::env::temp_dir().join("trimloop");
    ctx.interval_s = 0.1;
    ctx.duration_s = duration_s;

    // Slow full-range throttle sweep so knock appears near wide open
    let engine = SimulatedEngine::new(&config, Some(42)).with_throttle(50.0, 45.0, 0.3);
    let ecu = Ecu::new(
        config,
        Box::new(engine),
        Box::new(SpeedDensity::new(&config.engine)?),
    )?;

    let mut sim = Simulation::new(ctx, ecu);
    sim.add_dispatcher("csv", CsvDispatcher::new(false));
    let (latest, handle) = LatestValueDispatcher::new();
    sim.add_dispatcher("latest", latest);

    // Serialize and deserialize the simulation (for demonstration purposes)
    let serialized = serde_json::to_string_pretty(&sim)?;
    let _: Simulation = serde_json::from_str(&serialized)?;

    let summary = sim.run()?;
    println!(
        "{} cycles: {} computed, {} warm-up, {} skipped",
        summary.cycles, summary.computed, summary.warmup, summary.skipped
    );
    for channel in ["rpm", "lambda", "idle_correction", "fuel_correction", "knock_retard_deg"] {
        if let Some(v) = handle.get(channel) {
            println!("  {channel:>18} = {v:.4}");
        }
    }

    Ok(())
}
