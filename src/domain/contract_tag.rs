//! Identifiers for the marketplace's on-chain contracts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of contracts the service knows how to observe.
///
/// Each tag corresponds to one deployed contract address in configuration
/// and one frozen ABI surface in [`crate::chain::abi`]. An absent address
/// disables that tag's listener without affecting the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractTag {
    /// The STM ERC-20 token.
    Token,
    /// The crowdfunding contract (campaign creation, funding, finalization).
    Crowdfunding,
    /// The skin-payment contract (purchases paid in STM).
    SkinPayment,
    /// The skin ERC-721 collection (ownership transfers).
    Nft,
}

impl ContractTag {
    /// All tags, in a stable order. Used to enumerate configuration keys
    /// and checkpoint rows.
    pub const ALL: [Self; 4] = [Self::Token, Self::Crowdfunding, Self::SkinPayment, Self::Nft];

    /// Returns the tag as a stable lowercase string, used as a database
    /// key and in WebSocket subscription commands.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Crowdfunding => "crowdfunding",
            Self::SkinPayment => "skin_payment",
            Self::Nft => "nft",
        }
    }

    /// Returns the environment variable holding this contract's deployed
    /// address.
    #[must_use]
    pub const fn address_env_var(self) -> &'static str {
        match self {
            Self::Token => "STEAM_TOKEN_ADDRESS",
            Self::Crowdfunding => "CROWDFUNDING_ADDRESS",
            Self::SkinPayment => "SKIN_PAYMENT_ADDRESS",
            Self::Nft => "SKIN_NFT_ADDRESS",
        }
    }
}

impl fmt::Display for ContractTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token" => Ok(Self::Token),
            "crowdfunding" => Ok(Self::Crowdfunding),
            "skin_payment" => Ok(Self::SkinPayment),
            "nft" => Ok(Self::Nft),
            other => Err(format!("unknown contract tag: {other}")),
        }
    }
}
