//! # Transfer Controller
//!
//! Forwards the monitored wallet's token balance to the recipient whenever it
//! reaches the configured minimum. Failed attempts are retried with a growing
//! gas-price bonus; an attempt whose fate is unknown is remembered as
//! *deferred* and reported once the balance is observed to have drained.

use core_logic::GasConfig;
use ethers::types::{TxHash, U256};
use ethers::utils::to_checksum;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::ledger::{LedgerClient, LedgerError, SignedTransfer, TransferReceipt, TransferRequest};
use crate::notifier::{notify, Notification, Notifier};
use crate::price::PriceFeed;
use crate::units::{format_token_amount, format_usd, format_wei, token_threshold};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// Minimum balance to act on, in whole tokens.
    pub min_amount_to_send: U256,
    pub gas: GasConfig,
    pub retry_delay: Duration,
    pub receipt_timeout: Duration,
    pub funding_poll_interval: Duration,
    /// Attempts allowed per `sweep()` call; `None` retries until drained.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u32,
}

/// Mutable state carried between attempts. Recreated on every restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    /// Added to the network gas price; never below the configured floor.
    pub bonus_gas_price: U256,
    /// Set when an attempt may or may not have landed on chain.
    pub deferred: bool,
    pub deferred_amount: Option<U256>,
    pub last_tx_hash: Option<TxHash>,
}

impl ControllerState {
    pub fn new(floor: U256) -> Self {
        Self {
            bonus_gas_price: floor,
            deferred: false,
            deferred_amount: None,
            last_tx_hash: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Receipt reported success.
    Confirmed,
    /// Mined, but the receipt reported failure.
    Reverted,
    /// Node refused the transaction for lack of gas money.
    InsufficientFunds,
    /// Node refused the transaction for any other reason.
    Rejected,
    /// Submission or receipt wait failed; the transaction may still land.
    Unknown,
    /// Failed before anything was submitted.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttempt {
    pub amount: U256,
    pub gas_limit: Option<U256>,
    pub gas_price: Option<U256>,
    pub tx_hash: Option<TxHash>,
    pub outcome: AttemptOutcome,
}

impl TransferAttempt {
    fn new(amount: U256) -> Self {
        Self {
            amount,
            gas_limit: None,
            gas_price: None,
            tx_hash: None,
            outcome: AttemptOutcome::Aborted,
        }
    }

    fn finish(mut self, outcome: AttemptOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempts: u32,
    pub confirmed: u32,
    pub deferred_resolved: u32,
    /// The attempt cap stopped the sweep with tokens left.
    pub capped: bool,
}

pub struct TransferController {
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
    prices: Arc<dyn PriceFeed>,
    token: TokenInfo,
    settings: SweepSettings,
    state: ControllerState,
}

impl TransferController {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn Notifier>,
        prices: Arc<dyn PriceFeed>,
        token: TokenInfo,
        settings: SweepSettings,
    ) -> Self {
        let state = ControllerState::new(U256::from(settings.gas.bonus_floor_wei()));
        Self {
            ledger,
            notifier,
            prices,
            token,
            settings,
            state,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn token(&self) -> &TokenInfo {
        &self.token
    }

    fn bonus_floor(&self) -> U256 {
        U256::from(self.settings.gas.bonus_floor_wei())
    }

    fn escalate_bonus(&mut self) {
        let step = U256::from(self.settings.gas.bonus_step_wei());
        self.state.bonus_gas_price = self.state.bonus_gas_price.saturating_add(step);
        info!(
            "Bonus gas price raised to {} gwei",
            format_units_gwei(self.state.bonus_gas_price)
        );
    }

    /// Sends the whole token balance to the recipient for as long as it stays
    /// at or above the minimum, then reports any deferred transfer.
    ///
    /// Errors only when the token balance itself cannot be read.
    pub async fn sweep(&mut self) -> Result<SweepSummary, LedgerError> {
        let threshold = token_threshold(self.settings.min_amount_to_send, self.token.decimals);
        let mut summary = SweepSummary::default();

        loop {
            info!("Checking tokens balance");
            let mut balance = self.ledger.token_balance().await?;
            info!(
                "Tokens balance: {} {}",
                format_token_amount(balance, self.token.decimals),
                self.token.symbol
            );

            while balance >= threshold {
                if self
                    .settings
                    .max_attempts
                    .is_some_and(|max| summary.attempts >= max)
                {
                    error!(
                        "Giving up after {} transfer attempts; {} {} left in wallet",
                        summary.attempts,
                        format_token_amount(balance, self.token.decimals),
                        self.token.symbol
                    );
                    summary.capped = true;
                    return Ok(summary);
                }

                let attempt = self.attempt_transfer(balance).await;
                summary.attempts += 1;
                if attempt.outcome == AttemptOutcome::Confirmed {
                    summary.confirmed += 1;
                } else {
                    sleep(self.settings.retry_delay).await;
                }
                balance = self.ledger.token_balance().await?;
            }

            if !self.state.deferred {
                return Ok(summary);
            }
            self.resolve_deferred().await;
            summary.deferred_resolved += 1;
        }
    }

    /// The balance drained while an attempt was unaccounted for, so that
    /// attempt landed after all.
    async fn resolve_deferred(&mut self) {
        info!("DELAYED TRANSFER SUCCESS");
        self.state.bonus_gas_price = self.bonus_floor();
        self.state.deferred = false;
        let amount = self.state.deferred_amount.take().unwrap_or_default();

        notify(
            self.notifier.as_ref(),
            Notification::DelayedTransferSuccess {
                amount: format_token_amount(amount, self.token.decimals),
                symbol: self.token.symbol.clone(),
                from: to_checksum(&self.ledger.sender(), None),
                to: to_checksum(&self.ledger.recipient(), None),
                tx_hash: self.state.last_tx_hash.map(|h| format!("{:?}", h)),
            },
        )
        .await;
    }

    /// One transfer of `amount` to the recipient, classified by outcome.
    pub async fn attempt_transfer(&mut self, amount: U256) -> TransferAttempt {
        info!(
            "Transferring {} {}",
            format_token_amount(amount, self.token.decimals),
            self.token.symbol
        );
        let mut attempt = TransferAttempt::new(amount);

        let (request, signed) = match self.prepare(amount).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Transfer aborted before submission: {}", e);
                return attempt;
            }
        };
        attempt.gas_limit = Some(request.gas_limit);
        attempt.gas_price = Some(request.gas_price);
        let max_fee = request.gas_limit.saturating_mul(request.gas_price);

        let tx_hash = match self.ledger.submit(&signed).await {
            Ok(hash) => hash,
            Err(e) => {
                let outcome = self.handle_failure(amount, Some(signed.hash), max_fee, e).await;
                if outcome == AttemptOutcome::Unknown {
                    attempt.tx_hash = Some(signed.hash);
                }
                return attempt.finish(outcome);
            }
        };
        self.state.last_tx_hash = Some(tx_hash);
        attempt.tx_hash = Some(tx_hash);
        info!("Submitted {:?}", tx_hash);

        let outcome = match self
            .ledger
            .wait_for_receipt(tx_hash, self.settings.receipt_timeout)
            .await
        {
            Ok(receipt) if receipt.success => {
                self.on_confirmed(amount, &receipt).await;
                AttemptOutcome::Confirmed
            }
            Ok(receipt) => {
                self.on_reverted(&receipt).await;
                AttemptOutcome::Reverted
            }
            Err(e) => self.handle_failure(amount, None, max_fee, e).await,
        };
        attempt.finish(outcome)
    }

    async fn prepare(
        &self,
        amount: U256,
    ) -> Result<(TransferRequest, SignedTransfer), LedgerError> {
        let estimate = self.ledger.estimate_transfer_gas(amount).await?;
        let gas_limit = estimate.saturating_add(U256::from(self.settings.gas.limit_bonus));
        let network_price = self.ledger.gas_price().await?;
        let gas_price = network_price.saturating_add(self.state.bonus_gas_price);

        info!(
            "Gas limit: {}, Gas price, gwei: {}",
            gas_limit,
            format_units_gwei(gas_price)
        );
        info!(
            "Estimated max fee: {} ETH",
            format_wei(gas_limit.saturating_mul(gas_price), 6)
        );

        let nonce = self.ledger.latest_nonce().await?;
        let request = TransferRequest {
            to: self.ledger.recipient(),
            amount,
            gas_limit,
            gas_price,
            nonce,
        };
        let signed = self.ledger.sign_transfer(&request).await?;
        Ok((request, signed))
    }

    async fn on_confirmed(&mut self, amount: U256, receipt: &TransferReceipt) {
        info!("Transaction SUCCESS: {:?}", receipt.tx_hash);
        let fee = receipt.fee();
        let price = self.prices.eth_usd().await;

        notify(
            self.notifier.as_ref(),
            Notification::TransferSuccess {
                amount: format_token_amount(amount, self.token.decimals),
                symbol: self.token.symbol.clone(),
                from: to_checksum(&self.ledger.sender(), None),
                to: to_checksum(&self.ledger.recipient(), None),
                tx_hash: format!("{:?}", receipt.tx_hash),
                fee_eth: format_wei(fee, 6),
                fee_usd: format_usd(fee, price),
            },
        )
        .await;

        self.state.bonus_gas_price = self.bonus_floor();
        self.state.deferred = false;
        self.state.deferred_amount = None;
    }

    async fn on_reverted(&mut self, receipt: &TransferReceipt) {
        error!("Transaction FAILED: {:?}", receipt.tx_hash);
        let transaction = match self.ledger.describe_transaction(receipt.tx_hash).await {
            Ok(text) => text,
            Err(e) => format!("unavailable ({})", e),
        };
        info!("Tx: {}", transaction);
        info!("Receipt: {}", receipt.detail);

        notify(
            self.notifier.as_ref(),
            Notification::TransferFailed {
                tx_hash: format!("{:?}", receipt.tx_hash),
                transaction,
                receipt: receipt.detail.clone(),
            },
        )
        .await;

        self.escalate_bonus();
    }

    /// Classifies a submission or receipt-wait error and applies its effect.
    /// `local_hash` is the hash of a transaction that may have been broadcast
    /// without the node acknowledging it.
    async fn handle_failure(
        &mut self,
        amount: U256,
        local_hash: Option<TxHash>,
        max_fee: U256,
        err: LedgerError,
    ) -> AttemptOutcome {
        warn!("{}", err);
        match err {
            LedgerError::InsufficientFunds { .. } => {
                self.wait_until_funded(max_fee).await;
                AttemptOutcome::InsufficientFunds
            }
            LedgerError::Rejected { .. } => {
                self.escalate_bonus();
                AttemptOutcome::Rejected
            }
            _ => {
                if let Some(hash) = local_hash {
                    self.state.last_tx_hash = Some(hash);
                }
                self.state.deferred = true;
                self.state.deferred_amount = Some(amount);
                self.escalate_bonus();
                AttemptOutcome::Unknown
            }
        }
    }

    /// Blocks until the native balance rises above its current value, after
    /// one "insufficient balance" notification.
    pub async fn wait_until_funded(&self, required_fee: U256) {
        warn!("Waiting until balance funded");
        let poll = self.settings.funding_poll_interval;

        let start = loop {
            match self.ledger.native_balance().await {
                Ok(balance) => break balance,
                Err(e) => {
                    warn!("Balance query failed: {}", e);
                    sleep(poll).await;
                }
            }
        };
        let current_eth = format_wei(start, 5);
        warn!("Current balance: {} ETH", current_eth);

        let price = self.prices.eth_usd().await;
        notify(
            self.notifier.as_ref(),
            Notification::InsufficientBalance {
                address: to_checksum(&self.ledger.sender(), None),
                current_eth,
                required_eth: format_wei(required_fee, 6),
                required_usd: format_usd(required_fee, price),
            },
        )
        .await;

        loop {
            sleep(poll).await;
            match self.ledger.native_balance().await {
                Ok(balance) if balance > start => {
                    info!("Balance Funded");
                    info!("Current ETH: {}", format_wei(balance, 5));
                    return;
                }
                Ok(_) => {}
                Err(e) => warn!("Balance query failed: {}", e),
            }
        }
    }
}

fn format_units_gwei(wei: U256) -> String {
    ethers::utils::format_units(wei, "gwei").unwrap_or_else(|_| wei.to_string())
}
