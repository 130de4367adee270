//! Transport boundary to the Ethereum node.
//!
//! [`ChainTransport`] is the injected capability the Chain Reader is
//! built on. The production implementation is an alloy WebSocket
//! provider ([`super::rpc::RpcTransport`]); tests script a double that
//! delivers canned logs and simulated disconnects.

use std::future::Future;

use alloy::primitives::{Address, B256, Bytes};
use tokio::sync::mpsc;

use crate::error::SyncError;

/// One raw, undecoded log as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract address.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed data.
    pub data: Bytes,
    /// Block the log was mined in.
    pub block_number: u64,
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Position within the transaction receipt.
    pub log_index: u64,
}

/// Item yielded by a live log subscription.
///
/// A subscription never ends silently: when the underlying connection
/// drops, the final item is [`TransportSignal::Lost`] and the channel
/// closes. The supervisor reacts by reconnecting and replaying.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// A log arrived.
    Log(RawLog),
    /// The transport dropped; the payload describes why.
    Lost(String),
}

/// Minimal JSON-RPC surface the synchronization core needs.
pub trait ChainTransport: Send + Sync + 'static {
    /// Opens a live log subscription for the given contract addresses.
    fn subscribe_logs(
        &self,
        addresses: Vec<Address>,
    ) -> impl Future<Output = Result<mpsc::Receiver<TransportSignal>, SyncError>> + Send;

    /// Fetches historical logs for the given addresses and block range
    /// (inclusive).
    fn logs_range(
        &self,
        addresses: Vec<Address>,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>, SyncError>> + Send;

    /// Executes a read-only `eth_call`.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, SyncError>> + Send;

    /// Returns the deployed bytecode at an address (empty if none).
    fn code_at(&self, address: Address)
    -> impl Future<Output = Result<Bytes, SyncError>> + Send;

    /// Returns the current head block number.
    fn latest_block(&self) -> impl Future<Output = Result<u64, SyncError>> + Send;
}
