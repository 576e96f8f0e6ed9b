//! `miesc doctor` (spec §6.4): probes every registered tool's
//! availability and reports it, exit code reflecting whether anything
//! the registry knows about is unusable.

use aoc_coordinator::AuditCoordinator;
use std::time::Duration;

pub async fn run(coordinator: &AuditCoordinator) -> anyhow::Result<u8> {
    let registry = coordinator.registry();
    let snapshot = registry.availability_snapshot(Duration::from_secs(5)).await;

    if snapshot.is_empty() {
        eprintln!("no tools registered");
        return Ok(2);
    }

    let mut unavailable = 0;
    for (id, availability) in &snapshot {
        println!("{id}: {availability:?}");
        if !availability.is_available() {
            unavailable += 1;
        }
    }

    if unavailable == snapshot.len() {
        eprintln!("no tools are available");
        return Ok(2);
    }

    Ok(0)
}
