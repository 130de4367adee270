//! PostgreSQL implementation of the Mirror Store boundary.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{CheckpointStore, MirrorStore};
use crate::config::SyncConfig;
use crate::domain::{
    CampaignRecord, ContractTag, EntityKey, EntityKind, EventId, MirrorEntity, SkinRecord,
};
use crate::error::SyncError;

/// PostgreSQL-backed Mirror Store using `sqlx::PgPool`.
///
/// Monetary columns are `TEXT` wei decimal strings; arithmetic happens in
/// the reconciler with `U256`, never in SQL, so precision is preserved.
#[derive(Debug, Clone)]
pub struct PostgresMirrorStore {
    pool: PgPool,
}

impl PostgresMirrorStore {
    /// Connects to the database described by the configuration.
    ///
    /// This is the one startup step that is allowed to fail the process:
    /// without a usable store connection the service cannot mirror
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError::Store`] if the pool cannot be established.
    pub async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await
            .map_err(|e| SyncError::Store(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool (used by tests with a prepared database).
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the mirror tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError::Store`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), SyncError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS campaigns (\
                blockchain_id BIGINT PRIMARY KEY, \
                title TEXT NOT NULL, \
                goal TEXT NOT NULL, \
                deadline TIMESTAMPTZ NOT NULL, \
                creator TEXT, \
                amount_raised TEXT NOT NULL DEFAULT '0', \
                finalized BOOLEAN NOT NULL DEFAULT FALSE, \
                updated_at_block BIGINT NOT NULL DEFAULT 0)",
            "CREATE TABLE IF NOT EXISTS skins (\
                blockchain_id BIGINT PRIMARY KEY, \
                name TEXT, \
                owner TEXT, \
                updated_at_block BIGINT NOT NULL DEFAULT 0)",
            "CREATE TABLE IF NOT EXISTS seen_events (\
                transaction_hash TEXT NOT NULL, \
                log_index BIGINT NOT NULL, \
                seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                PRIMARY KEY (transaction_hash, log_index))",
            "CREATE TABLE IF NOT EXISTS checkpoints (\
                contract_tag TEXT NOT NULL, \
                event_name TEXT NOT NULL, \
                last_block BIGINT NOT NULL, \
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                PRIMARY KEY (contract_tag, event_name))",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?;
        }
        Ok(())
    }
}

/// Converts an on-chain id to the signed column type.
fn as_db_id(id: u64) -> Result<i64, SyncError> {
    i64::try_from(id).map_err(|_| SyncError::Store(format!("id {id} exceeds BIGINT range")))
}

impl MirrorStore for PostgresMirrorStore {
    async fn find(&self, key: EntityKey) -> Result<Option<MirrorEntity>, SyncError> {
        let id = as_db_id(key.id)?;
        match key.kind {
            EntityKind::Campaign => {
                let row = sqlx::query_as::<
                    _,
                    (i64, String, String, DateTime<Utc>, Option<String>, String, bool, i64),
                >(
                    "SELECT blockchain_id, title, goal, deadline, creator, amount_raised, \
                     finalized, updated_at_block FROM campaigns WHERE blockchain_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?;

                Ok(row.map(
                    |(
                        blockchain_id,
                        title,
                        goal,
                        deadline,
                        creator,
                        amount_raised,
                        finalized,
                        updated_at_block,
                    )| {
                        MirrorEntity::Campaign(CampaignRecord {
                            blockchain_id: blockchain_id.unsigned_abs(),
                            title,
                            goal,
                            deadline,
                            creator,
                            amount_raised,
                            finalized,
                            updated_at_block: updated_at_block.unsigned_abs(),
                        })
                    },
                ))
            }
            EntityKind::Skin => {
                let row = sqlx::query_as::<_, (i64, Option<String>, Option<String>, i64)>(
                    "SELECT blockchain_id, name, owner, updated_at_block \
                     FROM skins WHERE blockchain_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?;

                Ok(row.map(|(blockchain_id, name, owner, updated_at_block)| {
                    MirrorEntity::Skin(SkinRecord {
                        blockchain_id: blockchain_id.unsigned_abs(),
                        name,
                        owner,
                        updated_at_block: updated_at_block.unsigned_abs(),
                    })
                }))
            }
        }
    }

    async fn upsert(&self, entity: MirrorEntity) -> Result<(), SyncError> {
        match entity {
            MirrorEntity::Campaign(c) => {
                sqlx::query(
                    "INSERT INTO campaigns (blockchain_id, title, goal, deadline, creator, \
                     amount_raised, finalized, updated_at_block) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (blockchain_id) DO UPDATE SET \
                     title = EXCLUDED.title, goal = EXCLUDED.goal, \
                     deadline = EXCLUDED.deadline, creator = EXCLUDED.creator, \
                     amount_raised = EXCLUDED.amount_raised, \
                     finalized = EXCLUDED.finalized, \
                     updated_at_block = EXCLUDED.updated_at_block",
                )
                .bind(as_db_id(c.blockchain_id)?)
                .bind(&c.title)
                .bind(&c.goal)
                .bind(c.deadline)
                .bind(&c.creator)
                .bind(&c.amount_raised)
                .bind(c.finalized)
                .bind(as_db_id(c.updated_at_block)?)
                .execute(&self.pool)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?;
            }
            MirrorEntity::Skin(s) => {
                sqlx::query(
                    "INSERT INTO skins (blockchain_id, name, owner, updated_at_block) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (blockchain_id) DO UPDATE SET \
                     name = COALESCE(EXCLUDED.name, skins.name), \
                     owner = EXCLUDED.owner, \
                     updated_at_block = EXCLUDED.updated_at_block",
                )
                .bind(as_db_id(s.blockchain_id)?)
                .bind(&s.name)
                .bind(&s.owner)
                .bind(as_db_id(s.updated_at_block)?)
                .execute(&self.pool)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn mark_duplicate(&self, id: EventId) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "INSERT INTO seen_events (transaction_hash, log_index) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(format!("{:#x}", id.transaction_hash))
        .bind(as_db_id(id.log_index)?)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Store(e.to_string()))?;

        Ok(result.rows_affected() == 0)
    }
}

impl CheckpointStore for PostgresMirrorStore {
    async fn checkpoint(&self, tag: ContractTag, event_name: &str) -> Result<Option<u64>, SyncError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT last_block FROM checkpoints WHERE contract_tag = $1 AND event_name = $2",
        )
        .bind(tag.as_str())
        .bind(event_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Store(e.to_string()))?;

        Ok(row.map(|(block,)| block.unsigned_abs()))
    }

    async fn advance_checkpoint(
        &self,
        tag: ContractTag,
        event_name: &str,
        block: u64,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO checkpoints (contract_tag, event_name, last_block) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (contract_tag, event_name) DO UPDATE SET \
             last_block = GREATEST(checkpoints.last_block, EXCLUDED.last_block), \
             updated_at = NOW()",
        )
        .bind(tag.as_str())
        .bind(event_name)
        .bind(as_db_id(block)?)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Store(e.to_string()))?;

        Ok(())
    }
}
