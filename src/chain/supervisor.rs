//! Reconnection supervisor: connection health, backoff, and replay.
//!
//! Owns the Chain Reader lifecycle. Each cycle connects, verifies
//! deployments, opens the live subscription, replays the block range
//! missed since the last recorded checkpoint, and then forwards live
//! events — so a disconnect window never becomes a silent gap in event
//! coverage. Retries are unbounded with capped exponential backoff;
//! persistent problems are surfaced through counters and the state
//! channel rather than silently absorbed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};

use super::abi;
use super::reader::{ChainReader, ReaderSignal};
use super::transport::ChainTransport;
use crate::config::SyncConfig;
use crate::domain::{ChainEvent, ConnectionState, ContractTag, EventBus, SyncNotice, SyncStats};
use crate::error::SyncError;

/// Supervisor tuning knobs, extracted from [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Base delay between reconnection attempts.
    pub base_delay: Duration,
    /// Cap on the exponential delay.
    pub max_delay: Duration,
    /// Capacity of the decoded-event channel handed to the reader.
    pub channel_capacity: usize,
    /// Block span per historical `eth_getLogs` call during replay.
    pub replay_chunk_blocks: u64,
}

impl SupervisorConfig {
    /// Extracts the supervisor settings from the service configuration.
    #[must_use]
    pub const fn from_sync(config: &SyncConfig) -> Self {
        Self {
            base_delay: config.reconnect_base_delay,
            max_delay: config.reconnect_max_delay,
            channel_capacity: config.event_queue_capacity,
            replay_chunk_blocks: config.replay_chunk_blocks,
        }
    }
}

/// Capped exponential backoff with jitter.
///
/// The delay doubles per attempt up to the cap; the actual sleep is drawn
/// uniformly from `[delay/2, delay]` so that a fleet of listeners does
/// not reconnect in lockstep.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    /// Doubling stops once `base << MAX_EXPONENT` exceeds any sane cap.
    const MAX_EXPONENT: u32 = 20;

    /// Creates a backoff schedule.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(Self::MAX_EXPONENT);
        self.attempt = self.attempt.saturating_add(1);

        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let cap_ms = self.cap.as_millis().min(u128::from(u64::MAX)) as u64;
        let delay_ms = base_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX))
            .min(cap_ms)
            .max(2);

        let jitter = rand::thread_rng().gen_range(0..=delay_ms / 2);
        Duration::from_millis(delay_ms / 2 + jitter)
    }

    /// Resets the schedule after a successful subscription.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Supervises the chain subscription: `Disconnected → Connecting →
/// Subscribed → (Disconnected on failure)`.
#[derive(Debug)]
pub struct Supervisor<C> {
    checkpoints: Arc<C>,
    events_tx: mpsc::Sender<ChainEvent>,
    bus: EventBus,
    stats: Arc<SyncStats>,
    config: SupervisorConfig,
    state_tx: watch::Sender<ConnectionState>,
    backoff: Backoff,
}

impl<C> Supervisor<C>
where
    C: crate::store::CheckpointStore + 'static,
{
    /// Creates the supervisor and the state channel observers read.
    #[must_use]
    pub fn new(
        checkpoints: Arc<C>,
        events_tx: mpsc::Sender<ChainEvent>,
        bus: EventBus,
        stats: Arc<SyncStats>,
        config: SupervisorConfig,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let backoff = Backoff::new(config.base_delay, config.max_delay);
        (
            Self {
                checkpoints,
                events_tx,
                bus,
                stats,
                config,
                state_tx,
                backoff,
            },
            state_rx,
        )
    }

    /// Runs the supervision loop forever.
    ///
    /// `factory` builds a fresh [`ChainReader`] per cycle (it typically
    /// dials the node). The loop only returns when the event queue is
    /// closed, i.e. the service is shutting down.
    pub async fn run<T, F, Fut>(mut self, factory: F)
    where
        T: ChainTransport,
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<ChainReader<T>, SyncError>> + Send,
    {
        loop {
            self.set_state(ConnectionState::Connecting);

            let reader = match factory().await {
                Ok(reader) => reader,
                Err(e) => {
                    tracing::warn!(error = %e, "chain connection failed");
                    self.disconnect_and_wait().await;
                    continue;
                }
            };

            let active = match self.verify_deployments(&reader).await {
                Ok(active) => active,
                Err(e) => {
                    tracing::warn!(error = %e, "deployment verification failed");
                    self.disconnect_and_wait().await;
                    continue;
                }
            };
            if active.is_empty() {
                tracing::warn!(
                    failures = self.stats.deployment_failures(),
                    "no deployed contracts to watch; retrying later"
                );
                self.disconnect_and_wait().await;
                continue;
            }

            // Live first, then replay: the overlap between the historical
            // range and the already-open subscription is absorbed by the
            // dedup ledger, so no block can fall between the two.
            let mut live = match reader.subscribe(&active, self.config.channel_capacity).await {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::warn!(error = %e, "subscription failed");
                    self.disconnect_and_wait().await;
                    continue;
                }
            };
            self.set_state(ConnectionState::Subscribed);
            self.backoff.reset();

            if let Err(e) = self.replay(&reader, &active).await {
                tracing::warn!(error = %e, "replay failed");
                self.disconnect_and_wait().await;
                continue;
            }

            let reason = loop {
                match live.recv().await {
                    Some(ReaderSignal::Event(event)) => {
                        if self.events_tx.send(event).await.is_err() {
                            tracing::info!("event queue closed; supervisor stopping");
                            return;
                        }
                    }
                    Some(ReaderSignal::Lost(reason)) => break reason,
                    None => break "subscription channel closed".to_string(),
                }
            };

            tracing::warn!(reason, "transport lost; reconnecting");
            self.disconnect_and_wait().await;
        }
    }

    /// Verifies each configured contract and returns the tags that have
    /// code deployed. Codeless tags are disabled with a warning.
    async fn verify_deployments<T: ChainTransport>(
        &self,
        reader: &ChainReader<T>,
    ) -> Result<Vec<ContractTag>, SyncError> {
        let mut active = Vec::new();
        for tag in reader.contracts().tags() {
            if reader.verify_deployment(tag).await? {
                tracing::info!(%tag, "contract verified");
                active.push(tag);
            } else {
                tracing::warn!(%tag, "no contract code at configured address; listener disabled");
                self.stats.record_deployment_failure();
            }
        }
        Ok(active)
    }

    /// Replays `[earliest checkpoint + 1, head]` through the event queue.
    async fn replay<T: ChainTransport>(
        &self,
        reader: &ChainReader<T>,
        active: &[ContractTag],
    ) -> Result<(), SyncError> {
        let mut last_processed: Option<u64> = None;
        for tag in active {
            for event_name in abi::event_names(*tag) {
                if let Some(block) = self.checkpoints.checkpoint(*tag, event_name).await? {
                    last_processed = Some(last_processed.map_or(block, |b| b.min(block)));
                }
            }
        }

        let Some(last) = last_processed else {
            tracing::debug!("no checkpoint recorded; starting from live head");
            return Ok(());
        };

        let head = reader.head().await?;
        if last >= head {
            return Ok(());
        }

        let chunk = self.config.replay_chunk_blocks.max(1);
        let mut start = last.saturating_add(1);
        while start <= head {
            let end = head.min(start.saturating_add(chunk - 1));
            let events = reader.events_range(active, start, end).await?;
            tracing::info!(start, end, count = events.len(), "replaying missed block range");
            for event in events {
                if self.events_tx.send(event).await.is_err() {
                    return Err(SyncError::Internal("event queue closed".to_string()));
                }
            }
            start = end.saturating_add(1);
        }
        Ok(())
    }

    /// Transitions to `Disconnected`, counts the cycle, and sleeps the
    /// next backoff delay.
    async fn disconnect_and_wait(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.stats.record_reconnect();
        let delay = self.backoff.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "backing off");
        tokio::time::sleep(delay).await;
    }

    /// Publishes a state transition if the state actually changed.
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            let _ = self.bus.publish(SyncNotice::Connection {
                state,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(800));

        // Delay n is drawn from [d/2, d] where d doubles per attempt.
        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(50));
        assert!(first <= Duration::from_millis(100));

        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(100));
        assert!(second <= Duration::from_millis(200));

        // Far past the cap, delays stay within [cap/2, cap].
        for _ in 0..10 {
            let _ = backoff.next_delay();
        }
        let capped = backoff.next_delay();
        assert!(capped >= Duration::from_millis(400));
        assert!(capped <= Duration::from_millis(800));
    }

    #[test]
    fn backoff_reset_restarts_schedule() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(800));
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        backoff.reset();

        let after_reset = backoff.next_delay();
        assert!(after_reset <= Duration::from_millis(100));
    }

    #[test]
    fn backoff_never_returns_zero() {
        let mut backoff = Backoff::new(Duration::from_millis(0), Duration::from_millis(0));
        assert!(backoff.next_delay() >= Duration::from_millis(1));
    }

    mod replay {
        use super::super::*;
        use crate::chain::reader::ContractMap;
        use crate::chain::transport::{RawLog, TransportSignal};
        use crate::domain::{EntityKey, EntityKind, MirrorEntity};
        use crate::reconcile::Reconciler;
        use crate::store::{CheckpointStore, MemoryMirrorStore, MirrorStore};
        use alloy::primitives::{Address, B256, U256};
        use alloy::sol_types::SolEvent;
        use std::collections::VecDeque;
        use std::sync::Mutex;
        use std::sync::atomic::{AtomicU64, Ordering};

        // Wire-format twins of the crowdfunding events, used to build
        // raw logs exactly as the node would deliver them.
        mod wire {
            use alloy::sol;

            sol! {
                event CampaignCreated(
                    uint256 indexed campaignId,
                    string title,
                    uint256 goal,
                    uint256 deadline,
                    address indexed creator
                );
                event CampaignFunded(
                    uint256 indexed campaignId,
                    address indexed contributor,
                    uint256 amount,
                    uint256 tokensRewarded
                );
            }
        }

        const CROWDFUNDING: Address = Address::repeat_byte(0x03);

        fn created_log(campaign_id: u64, block: u64, tx_byte: u8) -> RawLog {
            let data = wire::CampaignCreated {
                campaignId: U256::from(campaign_id),
                title: "Gear".to_string(),
                goal: U256::from(1_000u64),
                deadline: U256::from(1_700_000_000u64),
                creator: Address::repeat_byte(0x11),
            }
            .encode_log_data();
            RawLog {
                address: CROWDFUNDING,
                topics: data.topics().to_vec(),
                data: data.data.clone(),
                block_number: block,
                transaction_hash: B256::repeat_byte(tx_byte),
                log_index: 0,
            }
        }

        fn funded_log(campaign_id: u64, amount: u64, block: u64, tx_byte: u8) -> RawLog {
            let data = wire::CampaignFunded {
                campaignId: U256::from(campaign_id),
                contributor: Address::repeat_byte(0x22),
                amount: U256::from(amount),
                tokensRewarded: U256::ZERO,
            }
            .encode_log_data();
            RawLog {
                address: CROWDFUNDING,
                topics: data.topics().to_vec(),
                data: data.data.clone(),
                block_number: block,
                transaction_hash: B256::repeat_byte(tx_byte),
                log_index: 0,
            }
        }

        /// Scripted node double: each subscription pops one session of
        /// live signals; an exhausted script leaves the channel open and
        /// silent.
        #[derive(Debug, Default)]
        struct MockTransport {
            sessions: Mutex<VecDeque<Vec<TransportSignal>>>,
            history: Mutex<Vec<RawLog>>,
            head: AtomicU64,
        }

        impl ChainTransport for MockTransport {
            async fn subscribe_logs(
                &self,
                _addresses: Vec<Address>,
            ) -> Result<tokio::sync::mpsc::Receiver<TransportSignal>, SyncError> {
                let session = self
                    .sessions
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pop_front();
                let (tx, rx) = tokio::sync::mpsc::channel(16);
                tokio::spawn(async move {
                    match session {
                        Some(signals) => {
                            for signal in signals {
                                if tx.send(signal).await.is_err() {
                                    return;
                                }
                            }
                            // Channel closes: the reader reports Lost.
                        }
                        None => {
                            // Stay subscribed, deliver nothing.
                            let _keep_open = tx;
                            std::future::pending::<()>().await;
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
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
                    .cloned()
                    .collect())
            }

            async fn call(
                &self,
                _to: Address,
                _data: alloy::primitives::Bytes,
            ) -> Result<alloy::primitives::Bytes, SyncError> {
                Ok(alloy::primitives::Bytes::new())
            }

            async fn code_at(
                &self,
                _address: Address,
            ) -> Result<alloy::primitives::Bytes, SyncError> {
                Ok(alloy::primitives::Bytes::from(vec![0x60, 0x80]))
            }

            async fn latest_block(&self) -> Result<u64, SyncError> {
                Ok(self.head.load(Ordering::SeqCst))
            }
        }

        #[tokio::test]
        async fn disconnect_replay_reaches_uninterrupted_state() {
            // Session 1: CampaignCreated at block 5, then the socket dies.
            // While disconnected, a funding event lands in block 7.
            // Session 2 replays [6, 8] (picking up block 7), then delivers
            // block 7 again plus block 9 live; the ledger absorbs the
            // overlap.
            let transport = Arc::new(MockTransport {
                sessions: Mutex::new(VecDeque::from(vec![
                    vec![TransportSignal::Log(created_log(1, 5, 0x01))],
                    vec![
                        TransportSignal::Log(funded_log(1, 10, 7, 0x02)),
                        TransportSignal::Log(funded_log(1, 20, 9, 0x03)),
                    ],
                ])),
                history: Mutex::new(vec![
                    created_log(1, 5, 0x01),
                    funded_log(1, 10, 7, 0x02),
                ]),
                head: AtomicU64::new(8),
            });

            let store = Arc::new(MemoryMirrorStore::new());
            let bus = EventBus::new(100);
            let stats = Arc::new(SyncStats::new());

            let mut contracts = ContractMap::default();
            contracts.insert(ContractTag::Crowdfunding, CROWDFUNDING);

            let (events_tx, events_rx) = mpsc::channel(64);
            let reconciler =
                Reconciler::new(Arc::clone(&store), bus.clone(), Arc::clone(&stats));
            let reconciler_task = tokio::spawn(reconciler.run(events_rx));

            let config = SupervisorConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                channel_capacity: 64,
                replay_chunk_blocks: 100,
            };
            let (supervisor, _connection) = Supervisor::new(
                Arc::clone(&store),
                events_tx,
                bus.clone(),
                Arc::clone(&stats),
                config,
            );

            let factory_transport = Arc::clone(&transport);
            let factory_bus = bus.clone();
            let factory_stats = Arc::clone(&stats);
            let supervisor_task = tokio::spawn(supervisor.run(move || {
                let transport = Arc::clone(&factory_transport);
                let contracts = contracts.clone();
                let bus = factory_bus.clone();
                let stats = Arc::clone(&factory_stats);
                async move { Ok(ChainReader::new(transport, contracts, bus, stats)) }
            }));

            // Uninterrupted processing of blocks 5, 7, 9 would leave the
            // campaign at 10 + 20 raised with checkpoints at 9.
            let key = EntityKey::new(EntityKind::Campaign, 1);
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            loop {
                let raised = match store.find(key).await {
                    Ok(Some(MirrorEntity::Campaign(c))) => c.amount_raised.clone(),
                    _ => String::new(),
                };
                let funded_cp = store
                    .checkpoint(ContractTag::Crowdfunding, "CampaignFunded")
                    .await
                    .ok()
                    .flatten();
                // Re-delivery of block 7 (live overlap or a later replay
                // round) must be absorbed as a duplicate, never summed.
                let duplicates = stats.snapshot().duplicates;
                if raised == "30" && funded_cp == Some(9) && duplicates >= 1 {
                    break;
                }
                if tokio::time::Instant::now() > deadline {
                    panic!(
                        "replay did not converge: raised={raised:?}, checkpoint={funded_cp:?}, duplicates={duplicates}"
                    );
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            supervisor_task.abort();
            let _ = reconciler_task.await;
        }
    }
}
