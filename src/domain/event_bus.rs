//! Broadcast channel for synchronization notices.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The reconciler
//! and the supervisor publish a [`SyncNotice`] for every step, and all
//! WebSocket connections subscribe to receive filtered notices.

use tokio::sync::broadcast;

use super::SyncNotice;

/// Broadcast bus for [`SyncNotice`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest notices are
/// dropped for lagging receivers — the Mirror Store, not the bus, is the
/// source of truth.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncNotice>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a notice to all subscribers.
    ///
    /// Returns the number of receivers that received the notice.
    /// If there are no active receivers, the notice is silently dropped.
    pub fn publish(&self, notice: SyncNotice) -> usize {
        self.sender.send(notice).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
