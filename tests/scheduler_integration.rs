// tests/scheduler_integration.rs
//! Cross-mode scheduler scenarios
//!
//! Exercises the driver-visible guarantees: order and multiset
//! preservation, failure isolation, bounded pool wall-clock behavior,
//! timeout handling, and per-agent mutual exclusion across ticks.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickweave::{
    AgentId, ExecutionMode, FailureKind, SchedulerConfig, StepUnit, TickScheduler,
};

fn config(mode: ExecutionMode) -> SchedulerConfig {
    SchedulerConfig {
        mode,
        pool_size: 2,
        ..Default::default()
    }
}

const ALL_MODES: [ExecutionMode; 3] = [
    ExecutionMode::Sequential,
    ExecutionMode::Cooperative,
    ExecutionMode::WorkerPool,
];

/// Deterministic mixed population: even agents suspend, odd agents block.
fn deterministic_population(n: usize) -> Vec<StepUnit<String>> {
    (0..n)
        .map(|i| {
            let id = format!("agent-{i}");
            let value = id.clone();
            if i % 2 == 0 {
                StepUnit::suspending(id, async move { Ok(value) })
            } else {
                StepUnit::blocking(id, move || Ok(value))
            }
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn order_and_multiset_preserved_in_every_mode() {
    for mode in ALL_MODES {
        let scheduler = TickScheduler::new(config(mode)).unwrap();
        let result = scheduler.run_tick(deterministic_population(12)).await.unwrap();

        assert_eq!(result.len(), 12, "mode {mode:?}");
        for (i, outcome) in result.iter().enumerate() {
            assert_eq!(
                outcome.id,
                AgentId::new(format!("agent-{i}")),
                "mode {mode:?}"
            );
        }
        scheduler.shutdown();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_equivalence_on_deterministic_steps() {
    let mut per_mode = Vec::new();

    for mode in ALL_MODES {
        let scheduler = TickScheduler::new(config(mode)).unwrap();
        let result = scheduler.run_tick(deterministic_population(9)).await.unwrap();
        let values: Vec<(String, Option<String>)> = result
            .into_outcomes()
            .into_iter()
            .map(|o| (o.id.to_string(), o.result.ok()))
            .collect();
        per_mode.push(values);
        scheduler.shutdown();
    }

    assert_eq!(per_mode[0], per_mode[1]);
    assert_eq!(per_mode[1], per_mode[2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failing_agent_leaves_siblings_identical() {
    for mode in ALL_MODES {
        // Run with agent-2 failing.
        let scheduler = TickScheduler::new(config(mode)).unwrap();
        let mut units = deterministic_population(5);
        units[2] = StepUnit::blocking("agent-2", || anyhow::bail!("step rejected"));
        let with_failure = scheduler.run_tick(units).await.unwrap();
        scheduler.shutdown();

        // Run with agent-2 omitted.
        let scheduler = TickScheduler::new(config(mode)).unwrap();
        let mut units = deterministic_population(5);
        units.remove(2);
        let without = scheduler.run_tick(units).await.unwrap();
        scheduler.shutdown();

        assert_eq!(
            with_failure.outcomes[2].failure_kind(),
            Some(FailureKind::OperationFailure),
            "mode {mode:?}"
        );

        let surviving: Vec<(String, Option<String>)> = with_failure
            .into_outcomes()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, o)| (o.id.to_string(), o.result.ok()))
            .collect();
        let reference: Vec<(String, Option<String>)> = without
            .into_outcomes()
            .into_iter()
            .map(|o| (o.id.to_string(), o.result.ok()))
            .collect();
        assert_eq!(surviving, reference, "mode {mode:?}");
    }
}

// Bounded-pool wall clock: 5 sleeping agents on 2 slots take about
// ceil(5/2) batches of the sleep duration.
#[tokio::test(flavor = "multi_thread")]
async fn worker_pool_batches_by_pool_size() {
    let scheduler = TickScheduler::new(config(ExecutionMode::WorkerPool)).unwrap();

    let sleep = Duration::from_millis(60);
    let units: Vec<StepUnit<String>> = (0..5)
        .map(|i| {
            let id = format!("agent-{i}");
            let value = id.clone();
            StepUnit::blocking(id, move || {
                std::thread::sleep(sleep);
                Ok(value)
            })
        })
        .collect();

    let started = Instant::now();
    let result = scheduler.run_tick(units).await.unwrap();
    let elapsed = started.elapsed();

    for (i, outcome) in result.iter().enumerate() {
        assert_eq!(outcome.result.as_deref().ok(), Some(format!("agent-{i}").as_str()));
    }
    // Three batches of 60ms, with slack for scheduling jitter.
    assert!(elapsed >= Duration::from_millis(170), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");

    scheduler.shutdown();
}

// The middle agent fails after resuming from its suspension point; its
// neighbors are untouched.
#[tokio::test(flavor = "multi_thread")]
async fn cooperative_mid_population_failure() {
    let scheduler = TickScheduler::new(config(ExecutionMode::Cooperative)).unwrap();

    let units: Vec<StepUnit<&'static str>> = vec![
        StepUnit::suspending("agent-0", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("agent-0 done")
        }),
        StepUnit::suspending("agent-1", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            anyhow::bail!("reasoning request failed after resume")
        }),
        StepUnit::suspending("agent-2", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("agent-2 done")
        }),
    ];

    let result = scheduler.run_tick(units).await.unwrap();

    assert!(result.outcomes[0].is_success());
    assert_eq!(
        result.outcomes[1].failure_kind(),
        Some(FailureKind::OperationFailure)
    );
    assert!(result.outcomes[2].is_success());

    scheduler.shutdown();
}

// A hung unit times out at its 100ms deadline while siblings return
// within their own time.
#[tokio::test(flavor = "multi_thread")]
async fn hung_unit_times_out_without_stalling_siblings() {
    let scheduler = TickScheduler::new(config(ExecutionMode::Cooperative)).unwrap();

    let units: Vec<StepUnit<&'static str>> = vec![
        StepUnit::suspending("hung", futures::future::pending())
            .with_deadline(Duration::from_millis(100)),
        StepUnit::suspending("quick", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("quick done")
        }),
        StepUnit::blocking("local", || Ok("local done")),
    ];

    let started = Instant::now();
    let result = scheduler.run_tick(units).await.unwrap();

    assert_eq!(result.outcomes[0].failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(result.outcomes[1].result.as_ref().ok(), Some(&"quick done"));
    assert_eq!(result.outcomes[2].result.as_ref().ok(), Some(&"local done"));
    assert!(started.elapsed() < Duration::from_secs(2));

    scheduler.shutdown();
}

// One unit per agent per tick plus non-overlapping ticks means an agent's
// step executions never overlap, even across consecutive ticks.
#[tokio::test(flavor = "multi_thread")]
async fn agent_executions_never_overlap_across_ticks() {
    let scheduler = TickScheduler::new(config(ExecutionMode::WorkerPool)).unwrap();
    let spans: Arc<parking_lot::Mutex<Vec<(Instant, Instant)>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));

    for _ in 0..3 {
        let spans = Arc::clone(&spans);
        let unit = StepUnit::blocking("watched", move || {
            let start = Instant::now();
            std::thread::sleep(Duration::from_millis(15));
            spans.lock().push((start, Instant::now()));
            Ok(())
        });
        scheduler.run_tick(vec![unit]).await.unwrap();
    }

    let spans = spans.lock();
    assert_eq!(spans.len(), 3);
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "executions overlapped");
    }

    scheduler.shutdown();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    // Order-preservation law: outcomes line up with inputs one-to-one in
    // every mode, for arbitrary populations.
    #[test]
    fn prop_outcomes_match_inputs(values in proptest::collection::vec(0u32..1000, 0..32)) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        let collected: Vec<Vec<(String, Option<u32>)>> = rt.block_on(async {
            let mut per_mode = Vec::new();
            for mode in ALL_MODES {
                let scheduler = TickScheduler::new(config(mode)).unwrap();
                let units: Vec<StepUnit<u32>> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let v = *v;
                        if v % 2 == 0 {
                            StepUnit::blocking(format!("agent-{i}"), move || Ok(v))
                        } else {
                            StepUnit::suspending(format!("agent-{i}"), async move { Ok(v) })
                        }
                    })
                    .collect();
                let result = scheduler.run_tick(units).await.unwrap();
                per_mode.push(
                    result
                        .into_outcomes()
                        .into_iter()
                        .map(|o| (o.id.to_string(), o.result.ok()))
                        .collect(),
                );
                scheduler.shutdown();
            }
            per_mode
        });

        let expected: Vec<(String, Option<u32>)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("agent-{i}"), Some(*v)))
            .collect();

        for observed in collected {
            prop_assert_eq!(&observed, &expected);
        }
    }
}
