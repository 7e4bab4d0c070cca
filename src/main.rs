use anyhow::{Context, Result};
use flex_aggregator::{config, controller, simulation, store, telemetry};
use config::Config;
use controller::AggregatorCoordinator;
use std::sync::Arc;
use store::memory::MemoryStore;
use telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let seed = cfg.simulation.random_seed;

    let homes = simulation::synthesize_population(&cfg).context("population synthesis failed")?;
    let series = simulation::synthesize_series(&cfg.weather, &cfg.simulation, seed)
        .context("exogenous series synthesis failed")?;

    info!(
        mode = %cfg.simulation.mode,
        homes = homes.len(),
        start = %cfg.simulation.start_datetime,
        end = %cfg.simulation.end_datetime,
        "starting community simulation"
    );

    let store = Arc::new(MemoryStore::new());
    let mut coordinator = AggregatorCoordinator::new(cfg, homes, series, store)?;
    let summary = coordinator.run().await?;

    info!(
        steps = summary.records.len(),
        max_agg_load = summary.max_agg_load,
        total_cost = summary.total_cost,
        failures = summary.total_failures,
        "simulation complete"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
