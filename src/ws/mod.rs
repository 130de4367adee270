//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams synchronization notices to
//! operator dashboards and UI clients, filtered per connection by
//! contract tag.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
