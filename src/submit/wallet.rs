//! Wallet boundary: the injected signing capability.
//!
//! The submitter never holds keys itself. Whatever can satisfy this
//! trait — a browser-injected provider bridged over RPC, a local signer
//! in tooling, a scripted double in tests — is handed in at construction
//! and treated as opaque.

use std::future::Future;

use alloy::primitives::{Address, B256, Bytes, U256};

use crate::error::SyncError;

/// One write transaction, ready for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Target contract address.
    pub to: Address,
    /// ABI-encoded calldata.
    pub data: Bytes,
    /// Native value attached (wei); zero for plain calls.
    pub value: U256,
}

impl TxRequest {
    /// Creates a value-less call.
    #[must_use]
    pub const fn call(to: Address, data: Bytes) -> Self {
        Self {
            to,
            data,
            value: U256::ZERO,
        }
    }

    /// Creates a payable call.
    #[must_use]
    pub const fn payable(to: Address, data: Bytes, value: U256) -> Self {
        Self { to, data, value }
    }
}

/// Receipt of a mined transaction, as reported by the wallet's node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Hash of the mined transaction.
    pub transaction_hash: B256,
    /// Block it was mined in.
    pub block_number: u64,
    /// `true` if execution succeeded.
    pub success: bool,
    /// Revert reason, when the node surfaced one.
    pub revert_reason: Option<String>,
}

/// Injected wallet/provider capability.
///
/// Error contract: `simulate` fails with [`SyncError::SimulatedRevert`]
/// when the call would revert on-chain; `send_transaction` fails with
/// [`SyncError::UserRejection`] when the user refuses to sign and
/// [`SyncError::Transport`] on connection trouble. Reasons are passed
/// through verbatim — the caller decides how to present them.
pub trait WalletGateway: Send + Sync + 'static {
    /// Returns the wallet's unlocked accounts, requesting access if
    /// needed.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>, SyncError>> + Send;

    /// Dry-runs the transaction (gas estimation / `eth_call`) without
    /// sending it.
    fn simulate(&self, request: &TxRequest)
    -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Signs and broadcasts the transaction, returning its hash.
    fn send_transaction(
        &self,
        request: TxRequest,
    ) -> impl Future<Output = Result<B256, SyncError>> + Send;

    /// Looks up the receipt of a previously sent transaction, if mined.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<TxReceipt>, SyncError>> + Send;

    /// Returns the current head block number (for confirmation depth).
    fn latest_block(&self) -> impl Future<Output = Result<u64, SyncError>> + Send;
}
