//! Full-size ramp against the in-memory hub
//!
//! Runs the default driver profile (50 → 500 clients, +10 every 2 s, one
//! invocation per client every 10 s, 10 minutes) on a paused clock and checks:
//! - the pool reaches the maximum and never exceeds it
//! - every connection keeps its own cadence
//! - all transports are closed on teardown

use std::collections::HashMap;
use std::time::Duration;

use hub_load_simulator::load::{HubTarget, LoadController, LoadProfile};
use tokio::time::Instant;

use crate::common::FakeHub;

fn default_profile() -> LoadProfile {
    LoadProfile {
        start_clients: 50,
        max_clients: 500,
        step_clients: 10,
        step_interval_seconds: 2,
        messaging_interval_seconds: 10,
        duration_seconds: 600,
    }
}

/// Test: Ramp to 500 connections with the default profile
#[tokio::test(start_paused = true)]
#[ignore] // Ignore by default as this is a slow test
async fn test_default_profile_ramps_to_max() {
    let hub = FakeHub::new();
    let controller = LoadController::new(hub.connector());
    controller
        .configure(
            HubTarget::new("http://localhost:3932/", "timeHub", "broadCastTime")
                .with_parameters(["%%ConnectionId%%"]),
        )
        .unwrap();

    let begin = Instant::now();
    let run = controller.run(default_profile()).unwrap();

    let mut peak = 0;
    while !run.is_stopped() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let size = run.pool_size();
        assert!(size >= peak);
        assert!(size <= 500);
        peak = size;
    }
    run.finished().await;

    println!(
        "Ramp finished - pool: {}, invocations: {}, elapsed: {:?}",
        run.pool_size(),
        hub.invocation_count(),
        begin.elapsed()
    );

    assert_eq!(run.pool_size(), 500);
    assert_eq!(hub.closed(), 500);

    let mut per_connection: HashMap<String, Vec<Instant>> = HashMap::new();
    for invocation in hub.invocations() {
        per_connection
            .entry(invocation.connection_id)
            .or_default()
            .push(invocation.at);
    }
    assert_eq!(per_connection.len(), 500);
    for times in per_connection.values() {
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }
}

/// Test: Concurrent stop requests during a ramp
///
/// Many callers stopping at once must leave exactly one stopped run with no
/// connections added afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_concurrent_stops_during_ramp() {
    let hub = FakeHub::new();
    let controller = std::sync::Arc::new(LoadController::new(hub.connector()));
    controller
        .configure(HubTarget::new("http://localhost:3932/", "timeHub", "broadCastTime"))
        .unwrap();

    let mut profile = default_profile();
    profile.messaging_interval_seconds = 1;
    let run = controller.run(profile).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut stoppers = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let controller = std::sync::Arc::clone(&controller);
        stoppers.spawn(async move { controller.stop() });
    }
    while stoppers.join_next().await.is_some() {}

    tokio::time::timeout(Duration::from_secs(10), run.finished())
        .await
        .expect("run should wind down");

    let size = run.pool_size();
    let invocations = hub.invocation_count();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(run.pool_size(), size);
    assert_eq!(hub.invocation_count(), invocations);
    // connections that finished connecting after the stop are closed without joining the pool
    assert_eq!(hub.closed(), hub.attempts());
    assert!(size <= hub.attempts());
}
