//! Event Reconciler: maps chain events to Mirror Store mutations.
//!
//! Consumes decoded events from the bounded queue the supervisor feeds,
//! deduplicates them against the ledger, and applies them serialized per
//! entity: every distinct `blockchain_id` gets its own lane task, so two
//! funding events for the same campaign can never race on the running
//! total while unrelated entities proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::U256;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::domain::{
    CampaignRecord, ChainEvent, EntityKey, EntityKind, EventBus, EventPayload, MirrorEntity,
    ReconcileOutcome, SyncNotice, SyncStats, entity::deadline_from_unix,
};
use crate::error::SyncError;
use crate::store::{CheckpointStore, MirrorStore};

/// Events buffered per entity lane before the dispatcher backpressures.
const LANE_CAPACITY: usize = 64;

/// Applies one decoded event to the store.
///
/// Dedup runs first: the ledger is marked before the mutation, so a
/// re-delivered event is always a [`ReconcileOutcome::Duplicate`] no-op
/// and non-idempotent mutations (funding increments) are applied at most
/// once. Overwrite-style fields (`owner`, `finalized`) are guarded by the
/// entity's high-water block; an older event is discarded as
/// [`ReconcileOutcome::Stale`].
///
/// # Errors
///
/// Returns [`SyncError::Store`] if a store operation fails. The ledger
/// entry survives the failure, which trades a lost mutation in that
/// narrow window against double-applying increments on redelivery.
pub async fn apply_event<S: MirrorStore>(
    store: &S,
    event: &ChainEvent,
) -> Result<ReconcileOutcome, SyncError> {
    if store.mark_duplicate(event.id).await? {
        return Ok(ReconcileOutcome::Duplicate);
    }

    match &event.payload {
        EventPayload::CampaignCreated {
            campaign_id,
            title,
            goal,
            deadline,
            creator,
        } => {
            let key = EntityKey::new(EntityKind::Campaign, *campaign_id);
            // Chain data is authoritative: an earlier advisory off-chain
            // record is overwritten, but its accumulated totals survive.
            let (amount_raised, finalized, created) = match store.find(key).await? {
                Some(MirrorEntity::Campaign(prev)) => {
                    if prev.updated_at_block > event.block_number {
                        return Ok(ReconcileOutcome::Stale);
                    }
                    (prev.amount_raised, prev.finalized, false)
                }
                _ => ("0".to_string(), false, true),
            };
            store
                .upsert(MirrorEntity::Campaign(CampaignRecord {
                    blockchain_id: *campaign_id,
                    title: title.clone(),
                    goal: goal.to_string(),
                    deadline: deadline_from_unix(*deadline),
                    creator: Some(format!("{creator:#x}")),
                    amount_raised,
                    finalized,
                    updated_at_block: event.block_number,
                }))
                .await?;
            Ok(if created {
                ReconcileOutcome::Created
            } else {
                ReconcileOutcome::Applied
            })
        }

        EventPayload::CampaignFunded {
            campaign_id,
            amount,
            ..
        } => {
            let key = EntityKey::new(EntityKind::Campaign, *campaign_id);
            match store.find(key).await? {
                Some(MirrorEntity::Campaign(mut campaign)) => {
                    campaign.amount_raised = add_wei(&campaign.amount_raised, *amount)?;
                    campaign.updated_at_block = campaign.updated_at_block.max(event.block_number);
                    store.upsert(MirrorEntity::Campaign(campaign)).await?;
                    Ok(ReconcileOutcome::Applied)
                }
                _ => Ok(ReconcileOutcome::EntityNotFound),
            }
        }

        EventPayload::CampaignFinalized {
            campaign_id,
            total_raised,
            ..
        } => {
            let key = EntityKey::new(EntityKind::Campaign, *campaign_id);
            match store.find(key).await? {
                Some(MirrorEntity::Campaign(mut campaign)) => {
                    if event.block_number < campaign.updated_at_block {
                        return Ok(ReconcileOutcome::Stale);
                    }
                    campaign.finalized = true;
                    // The contract reports the settled total; it supersedes
                    // the incrementally accumulated value.
                    campaign.amount_raised = total_raised.to_string();
                    campaign.updated_at_block = event.block_number;
                    store.upsert(MirrorEntity::Campaign(campaign)).await?;
                    Ok(ReconcileOutcome::Applied)
                }
                _ => Ok(ReconcileOutcome::EntityNotFound),
            }
        }

        EventPayload::SkinPurchased { buyer, skin_id, .. } => {
            set_skin_owner(store, event, *skin_id, format!("{buyer:#x}")).await
        }

        EventPayload::SkinTransfer { to, token_id, .. } => {
            set_skin_owner(store, event, *token_id, format!("{to:#x}")).await
        }

        EventPayload::TokenTransfer { .. } => Ok(ReconcileOutcome::Ignored),
    }
}

/// Transfers skin ownership, creating nothing: a purchase or transfer of
/// an unknown skin is a recoverable warning, not a creation event.
async fn set_skin_owner<S: MirrorStore>(
    store: &S,
    event: &ChainEvent,
    skin_id: u64,
    new_owner: String,
) -> Result<ReconcileOutcome, SyncError> {
    let key = EntityKey::new(EntityKind::Skin, skin_id);
    match store.find(key).await? {
        Some(MirrorEntity::Skin(mut skin)) => {
            if event.block_number < skin.updated_at_block {
                return Ok(ReconcileOutcome::Stale);
            }
            skin.owner = Some(new_owner);
            skin.updated_at_block = event.block_number;
            store.upsert(MirrorEntity::Skin(skin)).await?;
            Ok(ReconcileOutcome::Applied)
        }
        _ => Ok(ReconcileOutcome::EntityNotFound),
    }
}

/// Adds a wei amount to a stored decimal string with full precision.
fn add_wei(current: &str, delta: U256) -> Result<String, SyncError> {
    let parsed: U256 = current
        .trim()
        .parse()
        .map_err(|e| SyncError::Store(format!("corrupt stored amount {current:?}: {e}")))?;
    parsed
        .checked_add(delta)
        .map(|sum| sum.to_string())
        .ok_or_else(|| SyncError::Internal("amount overflow".to_string()))
}

/// Queue consumer that serializes mutations per entity.
#[derive(Debug)]
pub struct Reconciler<S> {
    store: Arc<S>,
    bus: EventBus,
    stats: Arc<SyncStats>,
}

impl<S> Reconciler<S>
where
    S: MirrorStore + CheckpointStore + 'static,
{
    /// Creates a reconciler over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, bus: EventBus, stats: Arc<SyncStats>) -> Self {
        Self { store, bus, stats }
    }

    /// Consumes the event queue until it closes, then drains all lanes.
    ///
    /// Lane tasks live for the life of the service; their number is
    /// bounded by the number of distinct entities observed.
    pub async fn run(self, mut events_rx: mpsc::Receiver<ChainEvent>) {
        let mut lanes: HashMap<EntityKey, mpsc::Sender<ChainEvent>> = HashMap::new();
        let mut workers = JoinSet::new();

        while let Some(event) = events_rx.recv().await {
            let Some(key) = event.entity_key() else {
                // No off-chain projection; process inline.
                Self::process(&self.store, &self.bus, &self.stats, event).await;
                continue;
            };

            let lane = lanes.entry(key).or_insert_with(|| {
                let (tx, mut rx) = mpsc::channel::<ChainEvent>(LANE_CAPACITY);
                let store = Arc::clone(&self.store);
                let bus = self.bus.clone();
                let stats = Arc::clone(&self.stats);
                workers.spawn(async move {
                    while let Some(event) = rx.recv().await {
                        Self::process(&store, &bus, &stats, event).await;
                    }
                });
                tx
            });

            if lane.send(event).await.is_err() {
                tracing::error!(%key, "entity lane closed unexpectedly");
                lanes.remove(&key);
            }
        }

        drop(lanes);
        while workers.join_next().await.is_some() {}
        tracing::info!("event queue closed; reconciler drained");
    }

    /// Applies one event, then records the outcome: counters, checkpoint
    /// advance, and a bus notice.
    async fn process(store: &Arc<S>, bus: &EventBus, stats: &Arc<SyncStats>, event: ChainEvent) {
        let tag = event.tag;
        let event_name = event.event_name();
        let event_id = event.id;
        let block_number = event.block_number;

        match apply_event(store.as_ref(), &event).await {
            Ok(outcome) => {
                match outcome {
                    ReconcileOutcome::EntityNotFound => {
                        tracing::warn!(
                            %tag,
                            event = event_name,
                            event_id = %event_id,
                            "no off-chain record for on-chain entity"
                        );
                    }
                    ReconcileOutcome::Stale => {
                        tracing::warn!(
                            %tag,
                            event = event_name,
                            event_id = %event_id,
                            block_number,
                            "discarded event older than mirrored state"
                        );
                    }
                    ReconcileOutcome::Duplicate => {
                        tracing::debug!(event_id = %event_id, "duplicate delivery absorbed");
                    }
                    _ => {
                        tracing::info!(
                            %tag,
                            event = event_name,
                            block_number,
                            outcome = outcome.as_str(),
                            "event reconciled"
                        );
                    }
                }
                stats.record_outcome(outcome);

                // The event counts as processed whatever the outcome, so
                // replay after a reconnect starts past it.
                if let Err(e) = store.advance_checkpoint(tag, event_name, block_number).await {
                    tracing::warn!(error = %e, "failed to advance checkpoint");
                }

                let _ = bus.publish(SyncNotice::Reconciled {
                    tag,
                    event_name,
                    event_id: event_id.to_string(),
                    block_number,
                    outcome,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                tracing::error!(
                    %tag,
                    event = event_name,
                    event_id = %event_id,
                    error = %e,
                    "failed to apply event"
                );
                stats.record_reconcile_failure();
                let _ = bus.publish(SyncNotice::ReconcileFailed {
                    tag,
                    event_id: event_id.to_string(),
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }
}
