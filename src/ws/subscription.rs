//! Per-connection subscription manager.
//!
//! Tracks which contract tags a WebSocket client is subscribed to and
//! provides server-side notice filtering.

use std::collections::HashSet;

use crate::domain::{ContractTag, SyncNotice};

/// Manages the set of contract subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed tags. If `subscribe_all` is true, this set is ignored.
    tags: HashSet<ContractTag>,
    /// Whether the client subscribes to all contracts (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds tags to the subscription set. `wildcard` enables match-all.
    pub fn subscribe(&mut self, tags: &[ContractTag], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        for tag in tags {
            self.tags.insert(*tag);
        }
    }

    /// Removes tags from the subscription set.
    pub fn unsubscribe(&mut self, tags: &[ContractTag]) {
        for tag in tags {
            self.tags.remove(tag);
        }
    }

    /// Returns `true` if the notice should be forwarded to this client.
    ///
    /// Connection-state notices have no tag and are always forwarded.
    #[must_use]
    pub fn matches(&self, notice: &SyncNotice) -> bool {
        match notice.tag() {
            None => true,
            Some(tag) => self.subscribe_all || self.tags.contains(&tag),
        }
    }

    /// Returns the number of explicitly subscribed tags.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub const fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
