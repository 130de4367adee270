//! Shared application state injected into all Axum handlers.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::{ConnectionState, EventBus, SyncStats};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Generic over the store type so the operational endpoints can read
/// checkpoints from whatever Mirror Store implementation was injected.
pub struct AppState<S> {
    /// Mirror Store (checkpoint reads for `/status`).
    pub store: Arc<S>,
    /// Event bus for WebSocket subscriptions.
    pub bus: EventBus,
    /// Pipeline counters.
    pub stats: Arc<SyncStats>,
    /// Live view of the supervisor's connection state.
    pub connection: watch::Receiver<ConnectionState>,
    /// Service start time, for uptime reporting.
    pub started_at: DateTime<Utc>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
            stats: Arc::clone(&self.stats),
            connection: self.connection.clone(),
            started_at: self.started_at,
        }
    }
}

impl<S> fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("connection", &*self.connection.borrow())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
