//! Transaction Submitter: client-side write orchestration.
//!
//! Builds marketplace write transactions, hands them to the injected
//! wallet, and tracks each one to a single terminal state through a
//! monitor task. The submitter never touches the Mirror Store: a
//! confirmed transaction becomes mirrored state only when its emitted
//! event flows through the reconciler, so the UI can never observe a
//! write the indexer has not seen.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use tokio::sync::watch;

use super::handle::{TransactionHandle, TxStatus};
use super::wallet::{TxReceipt, TxRequest, WalletGateway};
use crate::chain::ContractMap;
use crate::chain::abi;
use crate::config::SyncConfig;
use crate::domain::ContractTag;
use crate::error::SyncError;

/// Submitter tuning knobs, extracted from [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Blocks after the mined block required before `Confirmed`.
    pub confirmations: u64,
    /// Interval between receipt polls.
    pub poll_interval: Duration,
    /// Local deadline after which the handle transitions to `Dropped`.
    pub timeout: Duration,
}

impl SubmitterConfig {
    /// Extracts the submitter settings from the service configuration.
    #[must_use]
    pub const fn from_sync(config: &SyncConfig) -> Self {
        Self {
            confirmations: config.confirmation_depth,
            poll_interval: config.tx_poll_interval,
            timeout: config.tx_timeout,
        }
    }
}

/// Orchestrates write transactions against the marketplace contracts.
#[derive(Debug)]
pub struct TxSubmitter<W> {
    wallet: Arc<W>,
    contracts: ContractMap,
    config: SubmitterConfig,
}

impl<W: WalletGateway> TxSubmitter<W> {
    /// Creates a submitter over the given wallet and contract map.
    #[must_use]
    pub fn new(wallet: Arc<W>, contracts: ContractMap, config: SubmitterConfig) -> Self {
        Self {
            wallet,
            contracts,
            config,
        }
    }

    /// Returns the wallet's unlocked accounts.
    ///
    /// # Errors
    ///
    /// Passes wallet failures through verbatim.
    pub async fn accounts(&self) -> Result<Vec<Address>, SyncError> {
        self.wallet.request_accounts().await
    }

    /// Simulates, signs, and broadcasts a transaction.
    ///
    /// On success the returned handle is already `Submitted`; a monitor
    /// task drives it to exactly one terminal state. Multiple
    /// transactions may be in flight concurrently, each with its own
    /// handle.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SimulatedRevert`] — the call would fail on-chain;
    ///   nothing was sent. Not retriable.
    /// - [`SyncError::UserRejection`] — the wallet refused to sign. Not
    ///   retriable.
    /// - [`SyncError::Transport`] — connection trouble; the caller may
    ///   retry.
    pub async fn submit(&self, request: TxRequest) -> Result<TransactionHandle, SyncError> {
        self.wallet.simulate(&request).await?;
        let hash = self.wallet.send_transaction(request).await?;

        let (status_tx, status_rx) = watch::channel(TxStatus::Submitted);
        let wallet = Arc::clone(&self.wallet);
        let config = self.config.clone();
        tokio::spawn(monitor(wallet, hash, config, status_tx));

        tracing::info!(tx_hash = %hash, "transaction submitted");
        Ok(TransactionHandle::new(status_rx))
    }

    /// Suspends the caller until the handle resolves, mapping the
    /// terminal state onto the error taxonomy.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Reverted`] — mined but execution failed.
    /// - [`SyncError::ConfirmationTimeout`] — locally dropped; the
    ///   transaction may still confirm on-chain later.
    pub async fn await_confirmation(
        &self,
        handle: &mut TransactionHandle,
    ) -> Result<TxReceipt, SyncError> {
        match handle.terminal().await {
            TxStatus::Confirmed(receipt) => Ok(receipt),
            TxStatus::Reverted(reason) => Err(SyncError::Reverted(reason)),
            TxStatus::Dropped => Err(SyncError::ConfirmationTimeout),
            other => Err(SyncError::Internal(format!(
                "monitor ended in non-terminal status {other:?}"
            ))),
        }
    }

    /// Builds a `buySkin(skinId, price)` transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the skin-payment
    /// contract is not configured.
    pub fn buy_skin(&self, skin_id: u64, price: U256) -> Result<TxRequest, SyncError> {
        let to = self.target(ContractTag::SkinPayment)?;
        Ok(TxRequest::call(to, abi::encode_buy_skin(skin_id, price)))
    }

    /// Builds a `createCampaign(title, goal, durationInDays)` transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the crowdfunding
    /// contract is not configured.
    pub fn create_campaign(
        &self,
        title: &str,
        goal: U256,
        duration_days: u64,
    ) -> Result<TxRequest, SyncError> {
        let to = self.target(ContractTag::Crowdfunding)?;
        Ok(TxRequest::call(
            to,
            abi::encode_create_campaign(title, goal, duration_days),
        ))
    }

    /// Builds a payable `fundCampaign(campaignId)` transaction carrying
    /// `value` wei.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the crowdfunding
    /// contract is not configured.
    pub fn fund_campaign(&self, campaign_id: u64, value: U256) -> Result<TxRequest, SyncError> {
        let to = self.target(ContractTag::Crowdfunding)?;
        Ok(TxRequest::payable(
            to,
            abi::encode_fund_campaign(campaign_id),
            value,
        ))
    }

    /// Builds a `finalizeCampaign(campaignId)` transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the crowdfunding
    /// contract is not configured.
    pub fn finalize_campaign(&self, campaign_id: u64) -> Result<TxRequest, SyncError> {
        let to = self.target(ContractTag::Crowdfunding)?;
        Ok(TxRequest::call(to, abi::encode_finalize_campaign(campaign_id)))
    }

    /// Builds an STM `transfer(to, amount)` transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DeploymentMissing`] if the token contract is
    /// not configured.
    pub fn transfer_token(&self, to: Address, amount: U256) -> Result<TxRequest, SyncError> {
        let target = self.target(ContractTag::Token)?;
        Ok(TxRequest::call(target, abi::encode_token_transfer(to, amount)))
    }

    fn target(&self, tag: ContractTag) -> Result<Address, SyncError> {
        self.contracts
            .address(tag)
            .ok_or(SyncError::DeploymentMissing(tag))
    }
}

/// Drives one transaction from `Pending` to its terminal state.
///
/// Receipt and head queries that fail are retried at the poll interval —
/// a transport hiccup while waiting must not fail the transaction. The
/// sender is dropped on return, which latches the final state.
async fn monitor<W: WalletGateway>(
    wallet: Arc<W>,
    hash: B256,
    config: SubmitterConfig,
    status_tx: watch::Sender<TxStatus>,
) {
    let _ = status_tx.send(TxStatus::Pending(hash));
    let required_depth = config.confirmations.max(1);
    let deadline = tokio::time::Instant::now() + config.timeout;

    loop {
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(tx_hash = %hash, "not confirmed within timeout; handle dropped locally");
            let _ = status_tx.send(TxStatus::Dropped);
            return;
        }

        match wallet.transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                if receipt.success {
                    match wallet.latest_block().await {
                        Ok(head) => {
                            let depth =
                                head.saturating_sub(receipt.block_number).saturating_add(1);
                            if depth >= required_depth {
                                tracing::info!(
                                    tx_hash = %hash,
                                    block = receipt.block_number,
                                    depth,
                                    "transaction confirmed"
                                );
                                let _ = status_tx.send(TxStatus::Confirmed(receipt));
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "head query failed while confirming");
                        }
                    }
                } else {
                    let reason = receipt
                        .revert_reason
                        .clone()
                        .unwrap_or_else(|| "execution reverted".to_string());
                    tracing::warn!(tx_hash = %hash, reason, "transaction reverted on-chain");
                    let _ = status_tx.send(TxStatus::Reverted(reason));
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "receipt query failed; will retry");
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}
