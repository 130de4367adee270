//! Off-chain projections of on-chain entities.
//!
//! Mirror entities are keyed by the identifier the contract assigned
//! (`blockchain_id`), never by an internal primary key, so that on-chain
//! and off-chain records can always be correlated. Monetary fields are
//! stored as wei decimal strings to preserve full precision.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Kind of domain object a mirror entity projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A crowdfunding campaign.
    Campaign,
    /// A marketplace skin.
    Skin,
}

impl EntityKind {
    /// Stable lowercase name, used in logs and database keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::Skin => "skin",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key for a mirror entity: kind plus contract-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// What kind of entity this key addresses.
    pub kind: EntityKind,
    /// The on-chain identifier (`blockchain_id`).
    pub id: u64,
}

impl EntityKey {
    /// Creates a new key.
    #[must_use]
    pub const fn new(kind: EntityKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Mirror record of a crowdfunding campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    /// Contract-assigned campaign id.
    pub blockchain_id: u64,
    /// Campaign title as emitted at creation.
    pub title: String,
    /// Funding goal, wei decimal string.
    pub goal: String,
    /// Funding deadline.
    pub deadline: DateTime<Utc>,
    /// Creator wallet address (hex), if known.
    pub creator: Option<String>,
    /// Exact running total of contributions, wei decimal string.
    pub amount_raised: String,
    /// Whether the campaign has been finalized on-chain.
    pub finalized: bool,
    /// Highest block that mutated this record; ordering guard for
    /// overwrite-style fields.
    pub updated_at_block: u64,
}

/// Mirror record of a marketplace skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinRecord {
    /// Contract-assigned skin id.
    pub blockchain_id: u64,
    /// Display name, if the skin was registered off-chain first.
    pub name: Option<String>,
    /// Current owner wallet address (hex); `None` while unowned.
    pub owner: Option<String>,
    /// Highest block that mutated this record.
    pub updated_at_block: u64,
}

/// A mirror entity of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirrorEntity {
    /// Campaign projection.
    Campaign(CampaignRecord),
    /// Skin projection.
    Skin(SkinRecord),
}

impl MirrorEntity {
    /// Returns the lookup key for this entity.
    #[must_use]
    pub const fn key(&self) -> EntityKey {
        match self {
            Self::Campaign(c) => EntityKey::new(EntityKind::Campaign, c.blockchain_id),
            Self::Skin(s) => EntityKey::new(EntityKind::Skin, s.blockchain_id),
        }
    }
}

/// Converts a contract-reported unix deadline (seconds) to a UTC
/// timestamp. Out-of-range values clamp to the epoch.
#[must_use]
pub fn deadline_from_unix(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_display() {
        let key = EntityKey::new(EntityKind::Skin, 7);
        assert_eq!(key.to_string(), "skin#7");
    }

    #[test]
    fn campaign_key_uses_blockchain_id() {
        let entity = MirrorEntity::Campaign(CampaignRecord {
            blockchain_id: 3,
            title: "Gear".to_string(),
            goal: "10000000000000000000".to_string(),
            deadline: deadline_from_unix(1_700_000_000),
            creator: None,
            amount_raised: "0".to_string(),
            finalized: false,
            updated_at_block: 1,
        });
        assert_eq!(entity.key(), EntityKey::new(EntityKind::Campaign, 3));
    }

    #[test]
    fn deadline_conversion_is_seconds_based() {
        let ts = deadline_from_unix(1_700_000_000);
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn deadline_out_of_range_clamps_to_epoch() {
        assert_eq!(deadline_from_unix(u64::MAX), DateTime::<Utc>::UNIX_EPOCH);
    }
}
