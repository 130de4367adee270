//! Mirror Store boundary: the persistence collaborator.
//!
//! The synchronization core depends on exactly three operations —
//! `find`, `upsert`, `mark_duplicate` — plus a checkpoint pair used by
//! the reconnection supervisor for gap-free replay. The concrete store
//! is injected: PostgreSQL in production, an in-memory map in tests.

pub mod memory;
pub mod postgres;

use std::future::Future;

use crate::domain::{ContractTag, EntityKey, EventId, MirrorEntity};
use crate::error::SyncError;

pub use memory::MemoryMirrorStore;
pub use postgres::PostgresMirrorStore;

/// Denormalized off-chain views of on-chain entities.
///
/// Implementations must make `mark_duplicate` a test-and-set: the first
/// call for an [`EventId`] returns `false` and records it; every later
/// call returns `true`. This is what makes non-idempotent mutations
/// (funding increments) safe under at-least-once delivery.
pub trait MirrorStore: Send + Sync {
    /// Looks up the entity with the given key.
    fn find(
        &self,
        key: EntityKey,
    ) -> impl Future<Output = Result<Option<MirrorEntity>, SyncError>> + Send;

    /// Creates or fully replaces the entity.
    fn upsert(&self, entity: MirrorEntity) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Records the event id in the dedup ledger.
    ///
    /// Returns `true` if the id was already present (the event is a
    /// re-delivery and must be a no-op).
    fn mark_duplicate(&self, id: EventId) -> impl Future<Output = Result<bool, SyncError>> + Send;
}

/// Last successfully processed block height per subscription.
///
/// Keyed by `(contract_tag, event_name)`; `advance_checkpoint` is
/// monotonic so replayed history can never move a checkpoint backwards.
pub trait CheckpointStore: Send + Sync {
    /// Returns the recorded checkpoint, if any.
    fn checkpoint(
        &self,
        tag: ContractTag,
        event_name: &str,
    ) -> impl Future<Output = Result<Option<u64>, SyncError>> + Send;

    /// Raises the checkpoint to `block` if it is higher than the
    /// recorded value.
    fn advance_checkpoint(
        &self,
        tag: ContractTag,
        event_name: &str,
        block: u64,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}
