//! Decoded on-chain occurrences and their identity.
//!
//! A [`ChainEvent`] is the immutable record the rest of the pipeline works
//! with: the transport delivers raw logs, the ABI layer decodes them into
//! typed payloads, and the reconciler maps payloads to Mirror Store
//! mutations. The pair `(transaction_hash, log_index)` is globally unique
//! and is the deduplication key under at-least-once delivery.

use std::fmt;

use alloy::primitives::{Address, B256, U256};

use super::contract_tag::ContractTag;
use super::entity::{EntityKey, EntityKind};

/// Globally unique identity of one emitted log.
///
/// Re-delivery of the same `EventId` must be a no-op on the Mirror Store;
/// the dedup ledger is keyed by this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    /// Hash of the transaction that emitted the log.
    pub transaction_hash: B256,
    /// Position of the log within the transaction's receipt.
    pub log_index: u64,
}

impl EventId {
    /// Creates a new `EventId`.
    #[must_use]
    pub const fn new(transaction_hash: B256, log_index: u64) -> Self {
        Self {
            transaction_hash,
            log_index,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.transaction_hash, self.log_index)
    }
}

/// Typed payload of a decoded event, one variant per supported signature.
///
/// Monetary values stay as [`U256`] base units (wei) end to end; they are
/// only rendered to decimal strings at the Mirror Store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// `CampaignCreated(campaignId, title, goal, deadline, creator)`.
    CampaignCreated {
        /// Contract-assigned campaign identifier.
        campaign_id: u64,
        /// Campaign title.
        title: String,
        /// Funding goal in wei.
        goal: U256,
        /// Unix deadline in seconds.
        deadline: u64,
        /// Address that created the campaign.
        creator: Address,
    },

    /// `CampaignFunded(campaignId, contributor, amount, tokensRewarded)`.
    CampaignFunded {
        /// Contract-assigned campaign identifier.
        campaign_id: u64,
        /// Contributing address.
        contributor: Address,
        /// Contribution amount in wei.
        amount: U256,
        /// STM tokens rewarded for the contribution.
        tokens_rewarded: U256,
    },

    /// `CampaignFinalized(campaignId, totalRaised, creatorAmount, platformFee)`.
    CampaignFinalized {
        /// Contract-assigned campaign identifier.
        campaign_id: u64,
        /// Final raised total in wei.
        total_raised: U256,
        /// Amount paid out to the creator.
        creator_amount: U256,
        /// Platform fee taken.
        platform_fee: U256,
    },

    /// `SkinPurchased(buyer, skinId, price, platformFee, timestamp)`.
    SkinPurchased {
        /// Buying address; becomes the skin's owner.
        buyer: Address,
        /// Contract-assigned skin identifier.
        skin_id: u64,
        /// Purchase price in STM base units.
        price: U256,
        /// Platform fee taken.
        platform_fee: U256,
        /// Contract-reported purchase time (unix seconds).
        timestamp: u64,
    },

    /// ERC-20 `Transfer(from, to, value)` on the STM token.
    TokenTransfer {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Transferred amount in base units.
        value: U256,
    },

    /// ERC-721 `Transfer(from, to, tokenId)` on the skin collection.
    /// The token id equals the skin's `blockchain_id`.
    SkinTransfer {
        /// Previous owner (zero address on mint).
        from: Address,
        /// New owner.
        to: Address,
        /// Token id of the transferred skin.
        token_id: u64,
    },
}

impl EventPayload {
    /// Returns the on-chain event name for this payload.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::CampaignCreated { .. } => "CampaignCreated",
            Self::CampaignFunded { .. } => "CampaignFunded",
            Self::CampaignFinalized { .. } => "CampaignFinalized",
            Self::SkinPurchased { .. } => "SkinPurchased",
            Self::TokenTransfer { .. } | Self::SkinTransfer { .. } => "Transfer",
        }
    }
}

/// One decoded on-chain occurrence, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    /// Which contract emitted the log.
    pub tag: ContractTag,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Unique identity for deduplication.
    pub id: EventId,
    /// Decoded, typed payload.
    pub payload: EventPayload,
}

impl ChainEvent {
    /// Returns the on-chain event name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        self.payload.event_name()
    }

    /// Returns the Mirror Store entity this event concerns, or `None` for
    /// events with no off-chain projection (token transfers).
    #[must_use]
    pub const fn entity_key(&self) -> Option<EntityKey> {
        match &self.payload {
            EventPayload::CampaignCreated { campaign_id, .. }
            | EventPayload::CampaignFunded { campaign_id, .. }
            | EventPayload::CampaignFinalized { campaign_id, .. } => {
                Some(EntityKey::new(EntityKind::Campaign, *campaign_id))
            }
            EventPayload::SkinPurchased { skin_id, .. } => {
                Some(EntityKey::new(EntityKind::Skin, *skin_id))
            }
            EventPayload::SkinTransfer { token_id, .. } => {
                Some(EntityKey::new(EntityKind::Skin, *token_id))
            }
            EventPayload::TokenTransfer { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_id(byte: u8, index: u64) -> EventId {
        EventId::new(B256::repeat_byte(byte), index)
    }

    #[test]
    fn same_hash_and_index_are_equal() {
        assert_eq!(make_id(0xaa, 3), make_id(0xaa, 3));
        assert_ne!(make_id(0xaa, 3), make_id(0xaa, 4));
        assert_ne!(make_id(0xaa, 3), make_id(0xab, 3));
    }

    #[test]
    fn display_includes_hash_and_index() {
        let rendered = make_id(0x11, 7).to_string();
        assert!(rendered.starts_with("0x11"));
        assert!(rendered.ends_with(":7"));
    }

    #[test]
    fn campaign_events_map_to_campaign_entity() {
        let event = ChainEvent {
            tag: ContractTag::Crowdfunding,
            block_number: 10,
            id: make_id(0x01, 0),
            payload: EventPayload::CampaignFunded {
                campaign_id: 3,
                contributor: Address::repeat_byte(0xbb),
                amount: U256::from(500u64),
                tokens_rewarded: U256::from(5u64),
            },
        };
        assert_eq!(
            event.entity_key(),
            Some(EntityKey::new(EntityKind::Campaign, 3))
        );
        assert_eq!(event.event_name(), "CampaignFunded");
    }

    #[test]
    fn nft_transfer_maps_to_skin_entity() {
        let event = ChainEvent {
            tag: ContractTag::Nft,
            block_number: 10,
            id: make_id(0x02, 1),
            payload: EventPayload::SkinTransfer {
                from: Address::ZERO,
                to: Address::repeat_byte(0xaa),
                token_id: 7,
            },
        };
        assert_eq!(event.entity_key(), Some(EntityKey::new(EntityKind::Skin, 7)));
    }

    #[test]
    fn token_transfer_has_no_entity() {
        let event = ChainEvent {
            tag: ContractTag::Token,
            block_number: 10,
            id: make_id(0x03, 0),
            payload: EventPayload::TokenTransfer {
                from: Address::repeat_byte(0x01),
                to: Address::repeat_byte(0x02),
                value: U256::from(1u64),
            },
        };
        assert!(event.entity_key().is_none());
    }
}
