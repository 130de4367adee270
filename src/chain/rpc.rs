//! alloy-backed WebSocket transport.
//!
//! Thin adapter between the [`ChainTransport`] boundary and an alloy
//! provider. All provider-specific types stay inside this module.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, TransactionRequest};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::transport::{ChainTransport, RawLog, TransportSignal};
use crate::error::SyncError;

/// Capacity of the raw-log channel between the provider stream and the
/// decoding pump.
const RAW_LOG_CHANNEL_CAPACITY: usize = 256;

/// Production transport over a WebSocket JSON-RPC provider.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    provider: DynProvider,
}

impl RpcTransport {
    /// Connects to the node at the given WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(ws_url: &str) -> Result<Self, SyncError> {
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .map_err(|e| SyncError::Transport(format!("ws connect failed: {e}")))?;

        Ok(Self {
            provider: provider.erased(),
        })
    }

    /// Converts an RPC log into the transport's raw form. Logs without a
    /// mined position (pending logs) are dropped.
    fn to_raw_log(log: &alloy::rpc::types::Log) -> Option<RawLog> {
        Some(RawLog {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.inner.data.data.clone(),
            block_number: log.block_number?,
            transaction_hash: log.transaction_hash?,
            log_index: log.log_index?,
        })
    }
}

impl ChainTransport for RpcTransport {
    async fn subscribe_logs(
        &self,
        addresses: Vec<Address>,
    ) -> Result<mpsc::Receiver<TransportSignal>, SyncError> {
        let filter = Filter::new().address(addresses);
        let subscription = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| SyncError::Transport(format!("subscribe_logs failed: {e}")))?;

        let (tx, rx) = mpsc::channel(RAW_LOG_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = subscription.into_stream();
            while let Some(log) = stream.next().await {
                if let Some(raw) = Self::to_raw_log(&log)
                    && tx.send(TransportSignal::Log(raw)).await.is_err()
                {
                    return;
                }
            }
            // The provider closes the stream when the socket drops.
            let _ = tx
                .send(TransportSignal::Lost("log stream ended".to_string()))
                .await;
        });

        Ok(rx)
    }

    async fn logs_range(
        &self,
        addresses: Vec<Address>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, SyncError> {
        let filter = Filter::new()
            .address(addresses)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| SyncError::Transport(format!("get_logs failed: {e}")))?;

        Ok(logs.iter().filter_map(Self::to_raw_log).collect())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, SyncError> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(request)
            .await
            .map_err(|e| SyncError::Transport(format!("eth_call failed: {e}")))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, SyncError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| SyncError::Transport(format!("eth_getCode failed: {e}")))
    }

    async fn latest_block(&self) -> Result<u64, SyncError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| SyncError::Transport(format!("eth_blockNumber failed: {e}")))
    }
}
