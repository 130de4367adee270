//! Reconciliation layer: ledger truth applied to the Mirror Store.
//!
//! [`Reconciler`] consumes the decoded event queue and serializes
//! mutations per entity; [`apply_event`] is the single mapping from a
//! chain event to an idempotent store mutation.

pub mod reconciler;

pub use reconciler::{Reconciler, apply_event};
