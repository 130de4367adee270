//! Shared synchronization counters.
//!
//! One [`SyncStats`] instance is created at startup and handed to the
//! reconciler, the supervisor and the HTTP status endpoint. Counters are
//! plain relaxed atomics; they are operational signals, not ledger state.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::sync_notice::ReconcileOutcome;

/// Monotonic counters describing pipeline health.
#[derive(Debug, Default)]
pub struct SyncStats {
    applied: AtomicU64,
    created: AtomicU64,
    duplicates: AtomicU64,
    not_found: AtomicU64,
    stale: AtomicU64,
    ignored: AtomicU64,
    reconcile_failures: AtomicU64,
    decode_failures: AtomicU64,
    reconnects: AtomicU64,
    deployment_failures: AtomicU64,
}

/// Point-in-time copy of all counters, as served by `/status`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    /// Events that mutated an existing entity.
    pub applied: u64,
    /// Events that created a new entity.
    pub created: u64,
    /// Re-delivered events absorbed by the dedup ledger.
    pub duplicates: u64,
    /// Mutation events whose entity was missing off-chain.
    pub not_found: u64,
    /// Events discarded as older than the entity's high-water block.
    pub stale: u64,
    /// Events with no off-chain projection.
    pub ignored: u64,
    /// Events whose store mutation failed.
    pub reconcile_failures: u64,
    /// Raw logs that did not decode against the expected ABI.
    pub decode_failures: u64,
    /// Completed reconnection cycles.
    pub reconnects: u64,
    /// Deployment verifications that found no contract code.
    pub deployment_failures: u64,
}

impl SyncStats {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one reconciliation outcome.
    pub fn record_outcome(&self, outcome: ReconcileOutcome) {
        let counter = match outcome {
            ReconcileOutcome::Applied => &self.applied,
            ReconcileOutcome::Created => &self.created,
            ReconcileOutcome::Duplicate => &self.duplicates,
            ReconcileOutcome::EntityNotFound => &self.not_found,
            ReconcileOutcome::Stale => &self.stale,
            ReconcileOutcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed store mutation.
    pub fn record_reconcile_failure(&self) {
        self.reconcile_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a log that failed to decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed reconnection cycle.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a deployment verification that found no code.
    pub fn record_deployment_failure(&self) {
        self.deployment_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of deployment verifications that found no code.
    /// Surfaced so operators notice a persistently misconfigured address.
    #[must_use]
    pub fn deployment_failures(&self) -> u64 {
        self.deployment_failures.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            reconcile_failures: self.reconcile_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            deployment_failures: self.deployment_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_increment_their_counter() {
        let stats = SyncStats::new();
        stats.record_outcome(ReconcileOutcome::Applied);
        stats.record_outcome(ReconcileOutcome::Applied);
        stats.record_outcome(ReconcileOutcome::Duplicate);

        let snap = stats.snapshot();
        assert_eq!(snap.applied, 2);
        assert_eq!(snap.duplicates, 1);
        assert_eq!(snap.created, 0);
    }

    #[test]
    fn reconnects_accumulate() {
        let stats = SyncStats::new();
        stats.record_reconnect();
        stats.record_reconnect();
        assert_eq!(stats.snapshot().reconnects, 2);
    }
}
