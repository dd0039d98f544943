use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every connection of a run
#[derive(Debug, Default)]
pub struct RunStats {
    connections_opened: AtomicU64,
    connections_failed: AtomicU64,
    invocations_sent: AtomicU64,
    invocations_failed: AtomicU64,
    invocations_skipped: AtomicU64,
    callbacks_received: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections_opened: u64,
    pub connections_failed: u64,
    pub invocations_sent: u64,
    pub invocations_failed: u64,
    pub invocations_skipped: u64,
    pub callbacks_received: u64,
}

impl RunStats {
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }
    pub fn connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn invocation_sent(&self) {
        self.invocations_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn invocation_failed(&self) {
        self.invocations_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn invocation_skipped(&self) {
        self.invocations_skipped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn callback_received(&self) {
        self.callbacks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            invocations_sent: self.invocations_sent.load(Ordering::Relaxed),
            invocations_failed: self.invocations_failed.load(Ordering::Relaxed),
            invocations_skipped: self.invocations_skipped.load(Ordering::Relaxed),
            callbacks_received: self.callbacks_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = RunStats::default();
        stats.connection_opened();
        stats.connection_opened();
        stats.invocation_sent();
        stats.invocation_failed();
        stats.callback_received();

        let snap = stats.snapshot();
        assert_eq!(snap.connections_opened, 2);
        assert_eq!(snap.invocations_sent, 1);
        assert_eq!(snap.invocations_failed, 1);
        assert_eq!(snap.invocations_skipped, 0);
        assert_eq!(snap.callbacks_received, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(StatsSnapshot::default()).unwrap();
        assert_eq!(json["connections_failed"], 0);
    }
}
