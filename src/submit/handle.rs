//! Transaction lifecycle handles.
//!
//! A [`TransactionHandle`] is the caller's read-only view of one
//! submitted transaction. The monitor task owns the sending side; the
//! handle only observes. Exactly one terminal state is ever reached and
//! nothing transitions afterwards.

use alloy::primitives::B256;
use tokio::sync::watch;

use super::wallet::TxReceipt;

/// Lifecycle state of a submitted transaction.
///
/// `Built → Submitted → Pending(hash)` and then exactly one of
/// `Confirmed`, `Reverted`, or `Dropped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Calldata assembled, not yet handed to the wallet.
    Built,
    /// Accepted by the wallet and broadcast.
    Submitted,
    /// In the mempool (or mined but below the confirmation depth).
    Pending(B256),
    /// Mined successfully at the requested confirmation depth.
    Confirmed(TxReceipt),
    /// Mined but execution reverted; the payload is the reason.
    Reverted(String),
    /// Not confirmed within the local timeout. The transaction's real
    /// on-chain fate is unaffected; it may still confirm later, which
    /// callers must not assume away.
    Dropped,
}

impl TxStatus {
    /// Returns `true` for the three terminal states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Reverted(_) | Self::Dropped)
    }
}

/// Read-only observer of one transaction's lifecycle.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    status_rx: watch::Receiver<TxStatus>,
}

impl TransactionHandle {
    /// Wraps the observing side of a status channel.
    #[must_use]
    pub const fn new(status_rx: watch::Receiver<TxStatus>) -> Self {
        Self { status_rx }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TxStatus {
        self.status_rx.borrow().clone()
    }

    /// Suspends until the transaction reaches a terminal state, then
    /// returns it. Only the calling flow waits; the pipeline is not
    /// affected.
    pub async fn terminal(&mut self) -> TxStatus {
        loop {
            let current = self.status_rx.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.status_rx.changed().await.is_err() {
                // Monitor gone; whatever was last written stands.
                return self.status_rx.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(!TxStatus::Built.is_terminal());
        assert!(!TxStatus::Submitted.is_terminal());
        assert!(!TxStatus::Pending(B256::repeat_byte(0x01)).is_terminal());
        assert!(TxStatus::Dropped.is_terminal());
        assert!(TxStatus::Reverted("out of funds".to_string()).is_terminal());
    }

    #[tokio::test]
    async fn terminal_waits_through_intermediate_states() {
        let (tx, rx) = watch::channel(TxStatus::Submitted);
        let mut handle = TransactionHandle::new(rx);

        let waiter = tokio::spawn(async move { handle.terminal().await });

        let _ = tx.send(TxStatus::Pending(B256::repeat_byte(0x01)));
        let _ = tx.send(TxStatus::Dropped);

        let result = waiter.await;
        assert!(matches!(result, Ok(TxStatus::Dropped)));
    }

    #[tokio::test]
    async fn terminal_returns_immediately_when_already_terminal() {
        let (tx, rx) = watch::channel(TxStatus::Reverted("nope".to_string()));
        drop(tx);
        let mut handle = TransactionHandle::new(rx);
        let status = handle.terminal().await;
        assert!(matches!(status, TxStatus::Reverted(_)));
    }
}
