//! Chain Reader: the single point of contact with the node.
//!
//! Wraps an injected [`ChainTransport`] with the contract address map and
//! the ABI layer, turning raw logs into decoded [`ChainEvent`]s. The
//! reader has no retry logic of its own — the reconnection supervisor
//! owns its lifecycle and reacts to `Lost` signals.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use tokio::sync::mpsc;

use super::abi;
use super::transport::{ChainTransport, TransportSignal};
use crate::config::SyncConfig;
use crate::domain::{ChainEvent, ContractTag, EventBus, SyncNotice, SyncStats};
use crate::error::SyncError;

/// Immutable mapping between contract tags and deployed addresses.
///
/// Built once from configuration; tags without an address are simply
/// absent (their listeners are disabled).
#[derive(Debug, Clone, Default)]
pub struct ContractMap {
    by_tag: HashMap<ContractTag, Address>,
    by_address: HashMap<Address, ContractTag>,
}

impl ContractMap {
    /// Builds the map from configured addresses.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        let mut map = Self::default();
        for tag in ContractTag::ALL {
            if let Some(address) = config.contract_address(tag) {
                map.insert(tag, address);
            }
        }
        map
    }

    /// Registers one contract address.
    pub fn insert(&mut self, tag: ContractTag, address: Address) {
        self.by_tag.insert(tag, address);
        self.by_address.insert(address, tag);
    }

    /// Returns the deployed address for a tag.
    #[must_use]
    pub fn address(&self, tag: ContractTag) -> Option<Address> {
        self.by_tag.get(&tag).copied()
    }

    /// Returns the tag of an emitting address.
    #[must_use]
    pub fn tag_of(&self, address: Address) -> Option<ContractTag> {
        self.by_address.get(&address).copied()
    }

    /// Returns all configured tags.
    #[must_use]
    pub fn tags(&self) -> Vec<ContractTag> {
        ContractTag::ALL
            .into_iter()
            .filter(|tag| self.by_tag.contains_key(tag))
            .collect()
    }

    /// Returns the addresses for a subset of tags.
    #[must_use]
    pub fn addresses_for(&self, tags: &[ContractTag]) -> Vec<Address> {
        tags.iter().filter_map(|tag| self.address(*tag)).collect()
    }

    /// Returns `true` if no contract is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Item yielded by a decoded event subscription.
#[derive(Debug, Clone)]
pub enum ReaderSignal {
    /// A decoded event arrived.
    Event(ChainEvent),
    /// The transport dropped; the subscription is over.
    Lost(String),
}

/// Decoding facade over a [`ChainTransport`].
#[derive(Debug)]
pub struct ChainReader<T> {
    transport: Arc<T>,
    contracts: ContractMap,
    bus: EventBus,
    stats: Arc<SyncStats>,
}

impl<T: ChainTransport> ChainReader<T> {
    /// Creates a reader over the given transport and contract map.
    #[must_use]
    pub fn new(transport: Arc<T>, contracts: ContractMap, bus: EventBus, stats: Arc<SyncStats>) -> Self {
        Self {
            transport,
            contracts,
            bus,
            stats,
        }
    }

    /// Returns the contract map the reader was built with.
    #[must_use]
    pub const fn contracts(&self) -> &ContractMap {
        &self.contracts
    }

    /// Opens a live subscription for the given tags, decoding each raw
    /// log as it arrives.
    ///
    /// The returned channel terminates with [`ReaderSignal::Lost`] when
    /// the transport drops; it never ends silently. Undecodable logs are
    /// counted and skipped — decode failures must not stall delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the subscription cannot be
    /// established.
    pub async fn subscribe(
        &self,
        tags: &[ContractTag],
        capacity: usize,
    ) -> Result<mpsc::Receiver<ReaderSignal>, SyncError> {
        let addresses = self.contracts.addresses_for(tags);
        let mut raw_rx = self.transport.subscribe_logs(addresses).await?;

        let (tx, rx) = mpsc::channel(capacity);
        let contracts = self.contracts.clone();
        let bus = self.bus.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let mut lost_reported = false;
            while let Some(signal) = raw_rx.recv().await {
                match signal {
                    TransportSignal::Log(raw) => {
                        let Some(tag) = contracts.tag_of(raw.address) else {
                            tracing::debug!(address = %raw.address, "log from unknown address");
                            continue;
                        };
                        match abi::decode_log(tag, &raw) {
                            Ok(Some(event)) => {
                                if tx.send(ReaderSignal::Event(event)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(%tag, error = %e, "failed to decode log");
                                stats.record_decode_failure();
                                let _ = bus.publish(SyncNotice::DecodeFailed {
                                    tag,
                                    reason: e.to_string(),
                                    timestamp: chrono::Utc::now(),
                                });
                            }
                        }
                    }
                    TransportSignal::Lost(reason) => {
                        lost_reported = true;
                        let _ = tx.send(ReaderSignal::Lost(reason)).await;
                        return;
                    }
                }
            }
            if !lost_reported {
                let _ = tx
                    .send(ReaderSignal::Lost("log channel closed".to_string()))
                    .await;
            }
        });

        Ok(rx)
    }

    /// Fetches and decodes historical events for the given tags over an
    /// inclusive block range.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the log query fails.
    pub async fn events_range(
        &self,
        tags: &[ContractTag],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, SyncError> {
        let addresses = self.contracts.addresses_for(tags);
        let raw_logs = self
            .transport
            .logs_range(addresses, from_block, to_block)
            .await?;

        let mut events = Vec::with_capacity(raw_logs.len());
        for raw in &raw_logs {
            let Some(tag) = self.contracts.tag_of(raw.address) else {
                continue;
            };
            match abi::decode_log(tag, raw) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%tag, error = %e, "failed to decode historical log");
                    self.stats.record_decode_failure();
                }
            }
        }
        Ok(events)
    }

    /// Checks that bytecode exists at the configured address.
    ///
    /// Absence of code is reported as `Ok(false)` — the caller disables
    /// the listener rather than treating it as fatal.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the tag has no
    /// configured address, or [`SyncError::Transport`] if the code query
    /// fails.
    pub async fn verify_deployment(&self, tag: ContractTag) -> Result<bool, SyncError> {
        let address = self
            .contracts
            .address(tag)
            .ok_or(SyncError::DeploymentMissing(tag))?;
        let code = self.transport.code_at(address).await?;
        Ok(!code.is_empty())
    }

    /// Executes a read-only contract call. Never mutates state and is
    /// never retried automatically — the caller decides.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] for an unconfigured tag,
    /// or [`SyncError::Read`] if the call fails.
    pub async fn call(&self, tag: ContractTag, calldata: Bytes) -> Result<Bytes, SyncError> {
        let address = self
            .contracts
            .address(tag)
            .ok_or(SyncError::DeploymentMissing(tag))?;
        self.transport
            .call(address, calldata)
            .await
            .map_err(|e| SyncError::Read(e.to_string()))
    }

    /// Reads the STM balance of an address.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] or [`SyncError::Decode`] on failure.
    pub async fn token_balance_of(&self, owner: Address) -> Result<U256, SyncError> {
        let returned = self
            .call(ContractTag::Token, abi::encode_balance_of(owner))
            .await?;
        abi::decode_balance_of(&returned)
    }

    /// Reads a campaign's current on-chain state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] or [`SyncError::Decode`] on failure.
    pub async fn campaign_on_chain(
        &self,
        campaign_id: u64,
    ) -> Result<abi::OnChainCampaign, SyncError> {
        let returned = self
            .call(
                ContractTag::Crowdfunding,
                abi::encode_get_campaign(campaign_id),
            )
            .await?;
        abi::decode_get_campaign(&returned)
    }

    /// Returns the current head block number.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the query fails.
    pub async fn head(&self) -> Result<u64, SyncError> {
        self.transport.latest_block().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::transport::RawLog;
    use crate::domain::EventPayload;
    use alloy::primitives::B256;
    use alloy::sol_types::{SolEvent, SolValue};
    use std::sync::Mutex;

    // Wire-format twin of the skin-payment event, used to build raw logs
    // exactly as the node would deliver them.
    mod wire {
        use alloy::sol;

        sol! {
            event SkinPurchased(
                address indexed buyer,
                uint256 indexed skinId,
                uint256 price,
                uint256 platformFee,
                uint256 timestamp
            );
        }
    }

    const SKIN_PAYMENT: Address = Address::repeat_byte(0x02);

    fn purchase_log(skin_id: u64, block: u64, tx_byte: u8) -> RawLog {
        let data = wire::SkinPurchased {
            buyer: Address::repeat_byte(0xaa),
            skinId: U256::from(skin_id),
            price: U256::from(500u64),
            platformFee: U256::from(5u64),
            timestamp: U256::from(1_700_000_100u64),
        }
        .encode_log_data();
        RawLog {
            address: SKIN_PAYMENT,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number: block,
            transaction_hash: B256::repeat_byte(tx_byte),
            log_index: 0,
        }
    }

    /// Transport double with one scripted live session and fixed answers
    /// for the one-shot queries.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        live: Mutex<Vec<TransportSignal>>,
        history: Vec<RawLog>,
        code: Bytes,
        call_returns: Bytes,
        head: u64,
    }

    impl ChainTransport for ScriptedTransport {
        async fn subscribe_logs(
            &self,
            _addresses: Vec<Address>,
        ) -> Result<mpsc::Receiver<TransportSignal>, SyncError> {
            let signals =
                std::mem::take(&mut *self.live.lock().unwrap_or_else(|e| e.into_inner()));
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for signal in signals {
                    if tx.send(signal).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }

        async fn logs_range(
            &self,
            _addresses: Vec<Address>,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<RawLog>, SyncError> {
            Ok(self
                .history
                .iter()
                .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
                .cloned()
                .collect())
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, SyncError> {
            Ok(self.call_returns.clone())
        }

        async fn code_at(&self, _address: Address) -> Result<Bytes, SyncError> {
            Ok(self.code.clone())
        }

        async fn latest_block(&self) -> Result<u64, SyncError> {
            Ok(self.head)
        }
    }

    fn reader_over(transport: ScriptedTransport) -> (ChainReader<ScriptedTransport>, Arc<SyncStats>) {
        let mut contracts = ContractMap::default();
        contracts.insert(ContractTag::SkinPayment, SKIN_PAYMENT);
        contracts.insert(ContractTag::Token, Address::repeat_byte(0x01));
        contracts.insert(ContractTag::Crowdfunding, Address::repeat_byte(0x03));
        let stats = Arc::new(SyncStats::new());
        let reader = ChainReader::new(
            Arc::new(transport),
            contracts,
            EventBus::new(16),
            Arc::clone(&stats),
        );
        (reader, stats)
    }

    #[tokio::test]
    async fn subscribe_skips_undecodable_logs_and_ends_with_lost() {
        // A log carrying a tracked signature hash but no indexed topics
        // must be counted and skipped, not stall delivery.
        let good = purchase_log(7, 5, 0x01);
        let malformed = RawLog {
            topics: good.topics.first().copied().into_iter().collect(),
            data: Bytes::new(),
            transaction_hash: B256::repeat_byte(0x02),
            ..good.clone()
        };
        let transport = ScriptedTransport {
            live: Mutex::new(vec![
                TransportSignal::Log(malformed),
                TransportSignal::Log(good),
                TransportSignal::Lost("socket closed".to_string()),
            ]),
            ..ScriptedTransport::default()
        };
        let (reader, stats) = reader_over(transport);

        let rx = reader.subscribe(&[ContractTag::SkinPayment], 16).await;
        let Ok(mut rx) = rx else {
            panic!("subscribe failed");
        };

        let Some(ReaderSignal::Event(event)) = rx.recv().await else {
            panic!("expected the decodable event first");
        };
        let EventPayload::SkinPurchased { skin_id, .. } = event.payload else {
            panic!("wrong payload variant");
        };
        assert_eq!(skin_id, 7);

        let Some(ReaderSignal::Lost(reason)) = rx.recv().await else {
            panic!("subscription must end with a Lost signal");
        };
        assert_eq!(reason, "socket closed");
        assert_eq!(stats.snapshot().decode_failures, 1);
    }

    #[tokio::test]
    async fn events_range_drops_logs_from_unknown_addresses() {
        let mut foreign = purchase_log(9, 6, 0x03);
        foreign.address = Address::repeat_byte(0x77);
        let transport = ScriptedTransport {
            history: vec![purchase_log(7, 5, 0x01), foreign],
            ..ScriptedTransport::default()
        };
        let (reader, _stats) = reader_over(transport);

        let events = reader.events_range(&[ContractTag::SkinPayment], 1, 10).await;
        let Ok(events) = events else {
            panic!("events_range failed");
        };
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn verify_deployment_reports_missing_code() {
        let (reader, _stats) = reader_over(ScriptedTransport::default());
        let verified = reader.verify_deployment(ContractTag::SkinPayment).await;
        assert!(matches!(verified, Ok(false)));

        // An unconfigured tag is a configuration problem, not "no code".
        let unconfigured = reader.verify_deployment(ContractTag::Nft).await;
        assert!(matches!(
            unconfigured,
            Err(SyncError::DeploymentMissing(ContractTag::Nft))
        ));
    }

    #[tokio::test]
    async fn token_balance_reads_through_call() {
        let transport = ScriptedTransport {
            call_returns: U256::from(731u64).abi_encode().into(),
            ..ScriptedTransport::default()
        };
        let (reader, _stats) = reader_over(transport);

        let balance = reader.token_balance_of(Address::repeat_byte(0xaa)).await;
        assert!(matches!(balance, Ok(b) if b == U256::from(731u64)));
    }

    #[tokio::test]
    async fn campaign_read_decodes_contract_tuple() {
        let returns = (
            "Gear".to_string(),
            U256::from(10u64).pow(U256::from(19u64)),
            U256::from(1_700_000_000u64),
            U256::from(42u64),
            Address::repeat_byte(0x11),
            true,
            false,
        )
            .abi_encode_params();
        let transport = ScriptedTransport {
            call_returns: returns.into(),
            ..ScriptedTransport::default()
        };
        let (reader, _stats) = reader_over(transport);

        let campaign = reader.campaign_on_chain(3).await;
        let Ok(campaign) = campaign else {
            panic!("campaign read failed");
        };
        assert_eq!(campaign.title, "Gear");
        assert_eq!(campaign.amount_raised, U256::from(42u64));
        assert!(campaign.finalized);
        assert!(!campaign.cancelled);
    }
}
