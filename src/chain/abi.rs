//! Frozen ABI surface of the marketplace contracts.
//!
//! One `sol!` block per contract, namespaced because the ERC-20 and
//! ERC-721 `Transfer` events share a signature hash and are told apart by
//! the emitting address. Changing a contract means changing this module —
//! the event and method signatures are an external protocol.

use alloy::primitives::{Address, Bytes, Log, LogData, U256};
use alloy::sol_types::{SolCall, SolEvent};

use super::transport::RawLog;
use crate::domain::{ChainEvent, ContractTag, EventId, EventPayload};
use crate::error::SyncError;

mod token {
    use alloy::sol;

    sol! {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

mod crowdfunding {
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
        event CampaignFinalized(
            uint256 indexed campaignId,
            uint256 totalRaised,
            uint256 creatorAmount,
            uint256 platformFee
        );

        function createCampaign(string title, uint256 goal, uint256 durationInDays) external returns (uint256);
        function fundCampaign(uint256 campaignId) external payable;
        function finalizeCampaign(uint256 campaignId) external;
        function getCampaign(uint256 campaignId) external view returns (
            string title,
            uint256 goal,
            uint256 deadline,
            uint256 amountRaised,
            address creator,
            bool finalized,
            bool cancelled
        );
    }
}

/// On-chain view of a campaign, as returned by `getCampaign`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainCampaign {
    /// Campaign title.
    pub title: String,
    /// Funding goal in wei.
    pub goal: U256,
    /// Unix deadline in seconds.
    pub deadline: u64,
    /// Raised total in wei.
    pub amount_raised: U256,
    /// Creator address.
    pub creator: Address,
    /// Whether the campaign was finalized.
    pub finalized: bool,
    /// Whether the campaign was cancelled.
    pub cancelled: bool,
}

mod skin_payment {
    use alloy::sol;

    sol! {
        event SkinPurchased(
            address indexed buyer,
            uint256 indexed skinId,
            uint256 price,
            uint256 platformFee,
            uint256 timestamp
        );

        function buySkin(uint256 skinId, uint256 price) external;
    }
}

mod skin_nft {
    use alloy::sol;

    sol! {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// Event names the service tracks per contract, in checkpoint order.
#[must_use]
pub const fn event_names(tag: ContractTag) -> &'static [&'static str] {
    match tag {
        ContractTag::Token => &["Transfer"],
        ContractTag::Crowdfunding => {
            &["CampaignCreated", "CampaignFunded", "CampaignFinalized"]
        }
        ContractTag::SkinPayment => &["SkinPurchased"],
        ContractTag::Nft => &["Transfer"],
    }
}

/// Narrows a `uint256` event field into the `u64` identifier space.
fn as_u64(value: U256, field: &'static str) -> Result<u64, SyncError> {
    u64::try_from(value).map_err(|_| SyncError::Decode(format!("{field} exceeds u64 range")))
}

/// Decodes a raw log from a known contract into a [`ChainEvent`].
///
/// Returns `Ok(None)` for events the service does not track (e.g. ERC-20
/// `Approval`).
///
/// # Errors
///
/// Returns [`SyncError::Decode`] when a log carries a tracked signature
/// hash but its payload does not match the declared ABI.
pub fn decode_log(tag: ContractTag, raw: &RawLog) -> Result<Option<ChainEvent>, SyncError> {
    let Some(topic0) = raw.topics.first().copied() else {
        return Ok(None);
    };

    let prim_log = Log {
        address: raw.address,
        data: LogData::new_unchecked(raw.topics.clone(), raw.data.clone()),
    };

    let payload = match tag {
        ContractTag::Token => {
            if topic0 != token::Transfer::SIGNATURE_HASH {
                return Ok(None);
            }
            let decoded = token::Transfer::decode_log(&prim_log)
                .map_err(|e| SyncError::Decode(format!("token Transfer: {e}")))?;
            EventPayload::TokenTransfer {
                from: decoded.data.from,
                to: decoded.data.to,
                value: decoded.data.value,
            }
        }
        ContractTag::Crowdfunding => {
            if topic0 == crowdfunding::CampaignCreated::SIGNATURE_HASH {
                let decoded = crowdfunding::CampaignCreated::decode_log(&prim_log)
                    .map_err(|e| SyncError::Decode(format!("CampaignCreated: {e}")))?;
                EventPayload::CampaignCreated {
                    campaign_id: as_u64(decoded.data.campaignId, "campaignId")?,
                    title: decoded.data.title.clone(),
                    goal: decoded.data.goal,
                    deadline: as_u64(decoded.data.deadline, "deadline")?,
                    creator: decoded.data.creator,
                }
            } else if topic0 == crowdfunding::CampaignFunded::SIGNATURE_HASH {
                let decoded = crowdfunding::CampaignFunded::decode_log(&prim_log)
                    .map_err(|e| SyncError::Decode(format!("CampaignFunded: {e}")))?;
                EventPayload::CampaignFunded {
                    campaign_id: as_u64(decoded.data.campaignId, "campaignId")?,
                    contributor: decoded.data.contributor,
                    amount: decoded.data.amount,
                    tokens_rewarded: decoded.data.tokensRewarded,
                }
            } else if topic0 == crowdfunding::CampaignFinalized::SIGNATURE_HASH {
                let decoded = crowdfunding::CampaignFinalized::decode_log(&prim_log)
                    .map_err(|e| SyncError::Decode(format!("CampaignFinalized: {e}")))?;
                EventPayload::CampaignFinalized {
                    campaign_id: as_u64(decoded.data.campaignId, "campaignId")?,
                    total_raised: decoded.data.totalRaised,
                    creator_amount: decoded.data.creatorAmount,
                    platform_fee: decoded.data.platformFee,
                }
            } else {
                return Ok(None);
            }
        }
        ContractTag::SkinPayment => {
            if topic0 != skin_payment::SkinPurchased::SIGNATURE_HASH {
                return Ok(None);
            }
            let decoded = skin_payment::SkinPurchased::decode_log(&prim_log)
                .map_err(|e| SyncError::Decode(format!("SkinPurchased: {e}")))?;
            EventPayload::SkinPurchased {
                buyer: decoded.data.buyer,
                skin_id: as_u64(decoded.data.skinId, "skinId")?,
                price: decoded.data.price,
                platform_fee: decoded.data.platformFee,
                timestamp: as_u64(decoded.data.timestamp, "timestamp")?,
            }
        }
        ContractTag::Nft => {
            if topic0 != skin_nft::Transfer::SIGNATURE_HASH {
                return Ok(None);
            }
            let decoded = skin_nft::Transfer::decode_log(&prim_log)
                .map_err(|e| SyncError::Decode(format!("nft Transfer: {e}")))?;
            EventPayload::SkinTransfer {
                from: decoded.data.from,
                to: decoded.data.to,
                token_id: as_u64(decoded.data.tokenId, "tokenId")?,
            }
        }
    };

    Ok(Some(ChainEvent {
        tag,
        block_number: raw.block_number,
        id: EventId::new(raw.transaction_hash, raw.log_index),
        payload,
    }))
}

/// Encodes `balanceOf(owner)` calldata.
#[must_use]
pub fn encode_balance_of(owner: Address) -> Bytes {
    token::balanceOfCall { owner }.abi_encode().into()
}

/// Decodes a `balanceOf` return value.
///
/// # Errors
///
/// Returns [`SyncError::Decode`] if the returned bytes are not a single
/// `uint256`.
pub fn decode_balance_of(data: &[u8]) -> Result<U256, SyncError> {
    token::balanceOfCall::abi_decode_returns(data)
        .map_err(|e| SyncError::Decode(format!("balanceOf return: {e}")))
}

/// Encodes `transfer(to, amount)` calldata on the STM token.
#[must_use]
pub fn encode_token_transfer(to: Address, amount: U256) -> Bytes {
    token::transferCall { to, amount }.abi_encode().into()
}

/// Encodes `createCampaign(title, goal, durationInDays)` calldata.
#[must_use]
pub fn encode_create_campaign(title: &str, goal: U256, duration_days: u64) -> Bytes {
    crowdfunding::createCampaignCall {
        title: title.to_string(),
        goal,
        durationInDays: U256::from(duration_days),
    }
    .abi_encode()
    .into()
}

/// Encodes `getCampaign(campaignId)` calldata.
#[must_use]
pub fn encode_get_campaign(campaign_id: u64) -> Bytes {
    crowdfunding::getCampaignCall {
        campaignId: U256::from(campaign_id),
    }
    .abi_encode()
    .into()
}

/// Decodes a `getCampaign` return value.
///
/// # Errors
///
/// Returns [`SyncError::Decode`] if the returned bytes do not match the
/// declared tuple.
pub fn decode_get_campaign(data: &[u8]) -> Result<OnChainCampaign, SyncError> {
    let ret = crowdfunding::getCampaignCall::abi_decode_returns(data)
        .map_err(|e| SyncError::Decode(format!("getCampaign return: {e}")))?;
    Ok(OnChainCampaign {
        title: ret.title,
        goal: ret.goal,
        deadline: as_u64(ret.deadline, "deadline")?,
        amount_raised: ret.amountRaised,
        creator: ret.creator,
        finalized: ret.finalized,
        cancelled: ret.cancelled,
    })
}

/// Encodes `fundCampaign(campaignId)` calldata (value travels separately).
#[must_use]
pub fn encode_fund_campaign(campaign_id: u64) -> Bytes {
    crowdfunding::fundCampaignCall {
        campaignId: U256::from(campaign_id),
    }
    .abi_encode()
    .into()
}

/// Encodes `finalizeCampaign(campaignId)` calldata.
#[must_use]
pub fn encode_finalize_campaign(campaign_id: u64) -> Bytes {
    crowdfunding::finalizeCampaignCall {
        campaignId: U256::from(campaign_id),
    }
    .abi_encode()
    .into()
}

/// Encodes `buySkin(skinId, price)` calldata.
#[must_use]
pub fn encode_buy_skin(skin_id: u64, price: U256) -> Bytes {
    skin_payment::buySkinCall {
        skinId: U256::from(skin_id),
        price,
    }
    .abi_encode()
    .into()
}
