//! In-memory Mirror Store used by tests and local development.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::{CheckpointStore, MirrorStore};
use crate::domain::{ContractTag, EntityKey, EventId, MirrorEntity};
use crate::error::SyncError;

/// Map-backed implementation of the store boundary.
///
/// Semantics match the PostgreSQL adapter exactly; the reconciler test
/// suite runs against this type.
#[derive(Debug, Default)]
pub struct MemoryMirrorStore {
    entities: RwLock<HashMap<EntityKey, MirrorEntity>>,
    seen: RwLock<HashSet<EventId>>,
    checkpoints: RwLock<HashMap<(ContractTag, String), u64>>,
}

impl MemoryMirrorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entities.
    pub async fn entity_count(&self) -> usize {
        self.entities.read().await.len()
    }
}

impl MirrorStore for MemoryMirrorStore {
    async fn find(&self, key: EntityKey) -> Result<Option<MirrorEntity>, SyncError> {
        Ok(self.entities.read().await.get(&key).cloned())
    }

    async fn upsert(&self, entity: MirrorEntity) -> Result<(), SyncError> {
        self.entities.write().await.insert(entity.key(), entity);
        Ok(())
    }

    async fn mark_duplicate(&self, id: EventId) -> Result<bool, SyncError> {
        Ok(!self.seen.write().await.insert(id))
    }
}

impl CheckpointStore for MemoryMirrorStore {
    async fn checkpoint(&self, tag: ContractTag, event_name: &str) -> Result<Option<u64>, SyncError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&(tag, event_name.to_string()))
            .copied())
    }

    async fn advance_checkpoint(
        &self,
        tag: ContractTag,
        event_name: &str,
        block: u64,
    ) -> Result<(), SyncError> {
        let mut map = self.checkpoints.write().await;
        let entry = map.entry((tag, event_name.to_string())).or_insert(block);
        if *entry < block {
            *entry = block;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, SkinRecord};
    use alloy::primitives::B256;

    fn skin(id: u64, owner: Option<&str>) -> MirrorEntity {
        MirrorEntity::Skin(SkinRecord {
            blockchain_id: id,
            name: None,
            owner: owner.map(str::to_string),
            updated_at_block: 0,
        })
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let store = MemoryMirrorStore::new();
        let result = store.upsert(skin(7, Some("0xaa"))).await;
        assert!(result.is_ok());

        let found = store.find(EntityKey::new(EntityKind::Skin, 7)).await;
        let Ok(Some(MirrorEntity::Skin(record))) = found else {
            panic!("expected stored skin");
        };
        assert_eq!(record.owner.as_deref(), Some("0xaa"));
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = MemoryMirrorStore::new();
        let found = store.find(EntityKey::new(EntityKind::Campaign, 1)).await;
        assert!(matches!(found, Ok(None)));
    }

    #[tokio::test]
    async fn mark_duplicate_is_test_and_set() {
        let store = MemoryMirrorStore::new();
        let id = EventId::new(B256::repeat_byte(0x01), 0);

        assert!(matches!(store.mark_duplicate(id).await, Ok(false)));
        assert!(matches!(store.mark_duplicate(id).await, Ok(true)));
    }

    #[tokio::test]
    async fn checkpoint_only_moves_forward() {
        let store = MemoryMirrorStore::new();
        let tag = ContractTag::Crowdfunding;

        assert!(matches!(store.checkpoint(tag, "CampaignCreated").await, Ok(None)));

        let _ = store.advance_checkpoint(tag, "CampaignCreated", 10).await;
        let _ = store.advance_checkpoint(tag, "CampaignCreated", 5).await;

        let cp = store.checkpoint(tag, "CampaignCreated").await;
        assert!(matches!(cp, Ok(Some(10))));
    }

    #[tokio::test]
    async fn checkpoints_are_per_event_name() {
        let store = MemoryMirrorStore::new();
        let tag = ContractTag::Crowdfunding;

        let _ = store.advance_checkpoint(tag, "CampaignCreated", 10).await;
        let cp = store.checkpoint(tag, "CampaignFunded").await;
        assert!(matches!(cp, Ok(None)));
    }
}
