//! Domain layer: chain events, mirror entities, and the notice system.
//!
//! This module contains the core vocabulary of the service: the decoded
//! [`ChainEvent`] with its dedup identity, the [`MirrorEntity`] projections
//! keyed by on-chain identifiers, reconciliation outcomes, and the
//! broadcast bus that makes synchronization progress observable.

pub mod chain_event;
pub mod contract_tag;
pub mod entity;
pub mod event_bus;
pub mod stats;
pub mod sync_notice;

pub use chain_event::{ChainEvent, EventId, EventPayload};
pub use contract_tag::ContractTag;
pub use entity::{CampaignRecord, EntityKey, EntityKind, MirrorEntity, SkinRecord};
pub use event_bus::EventBus;
pub use stats::{StatsSnapshot, SyncStats};
pub use sync_notice::{ConnectionState, ReconcileOutcome, SyncNotice};
