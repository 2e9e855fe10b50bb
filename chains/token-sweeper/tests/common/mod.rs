#![allow(dead_code)]

use async_trait::async_trait;
use core_logic::GasConfig;
use ethers::types::{Address, BlockNumber, Bytes, TxHash, U256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use token_sweeper::ledger::{
    LedgerClient, LedgerError, SignedTransfer, TransferEvent, TransferEventSource,
    TransferReceipt, TransferRequest,
};
use token_sweeper::notifier::{Notification, Notifier, NotifyError};
use token_sweeper::price::PriceFeed;
use token_sweeper::{SweepSettings, TokenInfo, TransferController};

pub const GWEI: u64 = 1_000_000_000;
pub const NETWORK_GAS_PRICE: u64 = 30 * GWEI;
pub const GAS_ESTIMATE: u64 = 50_000;
pub const GAS_USED: u64 = 50_000;
pub const EFFECTIVE_GAS_PRICE: u64 = 32 * GWEI;

pub fn sender() -> Address {
    Address::from_low_u64_be(0xA11CE)
}

pub fn recipient() -> Address {
    Address::from_low_u64_be(0xB0B)
}

/// Whole tokens at 8 decimals.
pub fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(8)
}

pub fn gwei(n: u64) -> U256 {
    U256::from(n * GWEI)
}

/// What the fake node does with one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Mined successfully; the token balance drains.
    Confirm,
    /// Mined with a failed status; balance untouched.
    Revert,
    /// Submission refused for lack of gas money.
    InsufficientFunds,
    /// Submission refused with a generic JSON-RPC error.
    Reject,
    /// Accepted, receipt never seen in time, but the transfer lands.
    Lost,
    /// Transport failure on submission; nothing lands.
    SubmitTransportError,
    /// Gas estimation fails.
    FailEstimate,
}

pub struct FakeLedger {
    token_balance: Mutex<U256>,
    native_balances: Mutex<VecDeque<U256>>,
    steps: Mutex<VecDeque<Step>>,
    current: Mutex<Step>,
    requests: Mutex<Vec<TransferRequest>>,
    /// Transactions mined so far; a transfer stuck in the mempool does not count.
    mined_nonce: AtomicU64,
    subscription: Mutex<Option<ScriptedSource>>,
    pub native_balance_calls: AtomicUsize,
    pub token_balance_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new(token_balance: U256) -> Self {
        Self {
            token_balance: Mutex::new(token_balance),
            native_balances: Mutex::new(VecDeque::from(vec![U256::exp10(18)])),
            steps: Mutex::new(VecDeque::new()),
            current: Mutex::new(Step::Confirm),
            requests: Mutex::new(Vec::new()),
            mined_nonce: AtomicU64::new(0),
            subscription: Mutex::new(None),
            native_balance_calls: AtomicUsize::new(0),
            token_balance_calls: AtomicUsize::new(0),
        }
    }

    /// Steps are consumed one per attempt; once exhausted every attempt confirms.
    pub fn with_steps(self, steps: &[Step]) -> Self {
        *self.steps.lock().unwrap() = steps.iter().copied().collect();
        self
    }

    /// Successive native balance readings; the last one repeats.
    pub fn with_native_balances(self, balances: &[U256]) -> Self {
        *self.native_balances.lock().unwrap() = balances.iter().copied().collect();
        self
    }

    /// Source handed out by the next `subscribe_transfers` call.
    pub fn with_subscription(self, source: ScriptedSource) -> Self {
        *self.subscription.lock().unwrap() = Some(source);
        self
    }

    pub fn set_token_balance(&self, balance: U256) {
        *self.token_balance.lock().unwrap() = balance;
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn current(&self) -> Step {
        *self.current.lock().unwrap()
    }

    fn drain(&self) {
        self.set_token_balance(U256::zero());
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn sender(&self) -> Address {
        sender()
    }

    fn recipient(&self) -> Address {
        recipient()
    }

    async fn native_balance(&self) -> Result<U256, LedgerError> {
        self.native_balance_calls.fetch_add(1, Ordering::SeqCst);
        let mut balances = self.native_balances.lock().unwrap();
        let balance = if balances.len() > 1 {
            balances.pop_front().unwrap_or_default()
        } else {
            balances.front().copied().unwrap_or_default()
        };
        Ok(balance)
    }

    async fn token_balance(&self) -> Result<U256, LedgerError> {
        self.token_balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.token_balance.lock().unwrap())
    }

    async fn gas_price(&self) -> Result<U256, LedgerError> {
        Ok(U256::from(NETWORK_GAS_PRICE))
    }

    async fn estimate_transfer_gas(&self, _amount: U256) -> Result<U256, LedgerError> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Confirm);
        *self.current.lock().unwrap() = step;
        if step == Step::FailEstimate {
            return Err(LedgerError::Contract("execution reverted".to_string()));
        }
        Ok(U256::from(GAS_ESTIMATE))
    }

    async fn latest_nonce(&self) -> Result<U256, LedgerError> {
        Ok(U256::from(self.mined_nonce.load(Ordering::SeqCst)))
    }

    async fn sign_transfer(&self, request: &TransferRequest) -> Result<SignedTransfer, LedgerError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(SignedTransfer {
            raw: Bytes::from(vec![0xf8]),
            hash: TxHash::from_low_u64_be(requests.len() as u64),
        })
    }

    async fn submit(&self, transfer: &SignedTransfer) -> Result<TxHash, LedgerError> {
        match self.current() {
            Step::InsufficientFunds => Err(LedgerError::InsufficientFunds {
                message: "insufficient funds for gas * price + value".to_string(),
            }),
            Step::Reject => Err(LedgerError::Rejected {
                code: -32000,
                message: "replacement transaction underpriced".to_string(),
            }),
            Step::SubmitTransportError => {
                Err(LedgerError::Transport("connection reset".to_string()))
            }
            _ => Ok(transfer.hash),
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TransferReceipt, LedgerError> {
        let receipt = |success: bool| TransferReceipt {
            tx_hash,
            success,
            gas_used: U256::from(GAS_USED),
            effective_gas_price: U256::from(EFFECTIVE_GAS_PRICE),
            detail: format!("{{\"status\":\"{}\"}}", if success { "0x1" } else { "0x0" }),
        };
        match self.current() {
            Step::Confirm => {
                self.mined_nonce.fetch_add(1, Ordering::SeqCst);
                self.drain();
                Ok(receipt(true))
            }
            Step::Revert => {
                self.mined_nonce.fetch_add(1, Ordering::SeqCst);
                Ok(receipt(false))
            }
            Step::Lost => {
                // Lands after the timeout; its nonce is not mined yet.
                self.drain();
                Err(LedgerError::ReceiptTimeout { tx_hash, timeout })
            }
            other => panic!("no receipt expected for {:?}", other),
        }
    }

    async fn describe_transaction(&self, tx_hash: TxHash) -> Result<String, LedgerError> {
        Ok(format!("{{\"hash\":\"{:?}\"}}", tx_hash))
    }

    async fn subscribe_transfers(
        &self,
        _from: BlockNumber,
    ) -> Result<Box<dyn TransferEventSource>, LedgerError> {
        let source = self.subscription.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(source))
    }
}

/// Event source that hands out prepared batches, then empty ones (or an
/// error, when built with `failing_after`).
#[derive(Default)]
pub struct ScriptedSource {
    batches: VecDeque<Vec<TransferEvent>>,
    fail_when_drained: bool,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<TransferEvent>>) -> Self {
        Self {
            batches: batches.into(),
            ..Default::default()
        }
    }

    /// Serves `batches`, then fails every later fetch like a dropped filter.
    pub fn failing_after(batches: Vec<Vec<TransferEvent>>) -> Self {
        Self {
            batches: batches.into(),
            fail_when_drained: true,
        }
    }
}

#[async_trait]
impl TransferEventSource for ScriptedSource {
    async fn next_batch(&mut self) -> Result<Vec<TransferEvent>, LedgerError> {
        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None if self.fail_when_drained => {
                Err(LedgerError::Transport("filter not found".to_string()))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|n| n.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct FixedPrice(pub Option<f64>);

#[async_trait]
impl PriceFeed for FixedPrice {
    async fn eth_usd(&self) -> Option<f64> {
        self.0
    }
}

pub fn fast_settings() -> SweepSettings {
    SweepSettings {
        min_amount_to_send: U256::from(100u64),
        gas: GasConfig::default(),
        retry_delay: Duration::from_millis(1),
        receipt_timeout: Duration::from_millis(5),
        funding_poll_interval: Duration::from_millis(1),
        max_attempts: None,
    }
}

pub fn hex_token() -> TokenInfo {
    TokenInfo {
        symbol: "HEX".to_string(),
        decimals: 8,
    }
}

pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: TransferController,
}

pub fn harness(ledger: FakeLedger, settings: SweepSettings) -> Harness {
    let ledger = Arc::new(ledger);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = TransferController::new(
        ledger.clone(),
        notifier.clone(),
        Arc::new(FixedPrice(Some(2000.0))),
        hex_token(),
        settings,
    );
    Harness {
        ledger,
        notifier,
        controller,
    }
}
