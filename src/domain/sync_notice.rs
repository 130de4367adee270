//! Notices reflecting synchronization progress.
//!
//! Every reconciliation outcome and every connection-state transition
//! emits a [`SyncNotice`] through the [`super::EventBus`]. Notices are
//! broadcast to WebSocket subscribers and drive the operational counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::contract_tag::ContractTag;

/// Result of applying one chain event to the Mirror Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// An existing entity was mutated.
    Applied,
    /// A new entity was created from event data.
    Created,
    /// The event id was already in the dedup ledger; nothing changed.
    Duplicate,
    /// The event mutates an entity that does not exist off-chain.
    /// Recoverable warning; the ledger entry is retained.
    EntityNotFound,
    /// The event is older than the entity's high-water block and its
    /// overwrite-style mutation was discarded.
    Stale,
    /// The event has no off-chain projection.
    Ignored,
}

impl ReconcileOutcome {
    /// Stable lowercase name for logs and counters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::EntityNotFound => "entity_not_found",
            Self::Stale => "stale",
            Self::Ignored => "ignored",
        }
    }
}

/// Connection state of the supervised chain subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No live connection; the supervisor is backing off.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Live subscription established; events are flowing.
    Subscribed,
}

impl ConnectionState {
    /// Stable lowercase name for logs and the status endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
        }
    }
}

/// Notice emitted after every synchronization step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "notice_type", rename_all = "snake_case")]
pub enum SyncNotice {
    /// A chain event finished reconciliation.
    Reconciled {
        /// Contract that emitted the event.
        tag: ContractTag,
        /// On-chain event name.
        event_name: &'static str,
        /// Rendered event id (`txhash:logindex`).
        event_id: String,
        /// Block the event was mined in.
        block_number: u64,
        /// What the reconciler did with it.
        outcome: ReconcileOutcome,
        /// When reconciliation completed.
        timestamp: DateTime<Utc>,
    },

    /// A chain event could not be applied because of a store failure.
    ReconcileFailed {
        /// Contract that emitted the event.
        tag: ContractTag,
        /// Rendered event id.
        event_id: String,
        /// Failure description.
        reason: String,
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
    },

    /// A raw log could not be decoded against the contract's ABI.
    DecodeFailed {
        /// Contract whose ABI was expected.
        tag: ContractTag,
        /// Decode failure description.
        reason: String,
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
    },

    /// The supervised connection changed state.
    Connection {
        /// New connection state.
        state: ConnectionState,
        /// When the transition happened.
        timestamp: DateTime<Utc>,
    },
}

impl SyncNotice {
    /// Returns the contract tag the notice concerns, or `None` for
    /// connection-wide notices.
    #[must_use]
    pub const fn tag(&self) -> Option<ContractTag> {
        match self {
            Self::Reconciled { tag, .. }
            | Self::ReconcileFailed { tag, .. }
            | Self::DecodeFailed { tag, .. } => Some(*tag),
            Self::Connection { .. } => None,
        }
    }

    /// Returns the notice type as a static string slice.
    #[must_use]
    pub const fn notice_type_str(&self) -> &'static str {
        match self {
            Self::Reconciled { .. } => "reconciled",
            Self::ReconcileFailed { .. } => "reconcile_failed",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::Connection { .. } => "connection",
        }
    }
}
