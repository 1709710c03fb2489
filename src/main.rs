// src/main.rs
//! Tickweave demo driver
//!
//! Runs a few ticks over a mixed population: suspension-capable agents
//! simulating a remote reasoning call, and blocking agents doing local
//! computation. Mode, pool size, and timeout come from the `tickweave`
//! config file or `TICKWEAVE_*` environment variables.

use anyhow::Result;
use std::time::Duration;
use tickweave::observability::init_tracing;
use tickweave::{SchedulerConfig, StepUnit, TickScheduler};
use tracing::info;

const POPULATION: usize = 8;
const TICKS: u64 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("starting tickweave demo v{}", tickweave::VERSION);

    let config = SchedulerConfig::load()?;
    info!("configuration loaded: {:?}", config);

    let scheduler = TickScheduler::new(config)?;

    for tick in 0..TICKS {
        let units = build_population(tick);
        let result = scheduler.run_tick(units).await?;

        info!(
            tick = result.tick,
            agents = result.len(),
            failures = result.failures(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "tick complete"
        );
        for outcome in result.iter() {
            match &outcome.result {
                Ok(report) => info!(agent = %outcome.id, "{report}"),
                Err(failure) => info!(agent = %outcome.id, "failed: {failure}"),
            }
        }
    }

    scheduler.shutdown();
    info!("demo finished");
    Ok(())
}

/// One tick's units: even agents suspend on a simulated remote call, odd
/// agents run a blocking local computation.
fn build_population(tick: u64) -> Vec<StepUnit<String>> {
    (0..POPULATION)
        .map(|i| {
            let id = format!("agent-{i}");
            if i % 2 == 0 {
                let agent = id.clone();
                StepUnit::suspending(id, async move {
                    // Stands in for a remote reasoning request.
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    Ok(format!("{agent} deliberated on tick {tick}"))
                })
            } else {
                let agent = id.clone();
                StepUnit::blocking(id, move || {
                    let sum: u64 = (0..200_000).sum();
                    Ok(format!("{agent} computed {sum} on tick {tick}"))
                })
            }
        })
        .collect()
}
