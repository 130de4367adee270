//! Submission layer: wallet boundary and transaction lifecycle tracking.
//!
//! [`TxSubmitter`] builds marketplace write transactions and tracks each
//! through its [`TransactionHandle`]. Mirror state is never written here;
//! that is the reconciler's exclusive job.

pub mod handle;
pub mod submitter;
pub mod wallet;

pub use handle::{TransactionHandle, TxStatus};
pub use submitter::{SubmitterConfig, TxSubmitter};
pub use wallet::{TxReceipt, TxRequest, WalletGateway};
