//! # Ledger Client
//!
//! Everything the sweeper needs from the chain, for one sender/recipient
//! pair and one ERC-20 contract. Chain id and signing key are bound when a
//! client is constructed, so callers never handle them.

use async_trait::async_trait;
use ethers::types::{Address, BlockNumber, Bytes, TxHash, U256};
use std::time::Duration;
use thiserror::Error;

pub mod evm;

pub use evm::EvmLedger;

/// Errors surfaced by a [`LedgerClient`].
///
/// Submission failures are classified here, at the boundary, so that the
/// transfer controller can match on the variant instead of inspecting text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The node refused the transaction because the sender cannot pay for gas.
    #[error("Insufficient funds for gas: {message}")]
    InsufficientFunds { message: String },

    /// The node answered with a JSON-RPC error; the transaction was not accepted.
    #[error("Transaction rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("No receipt for {tx_hash:?} after {timeout:?}")]
    ReceiptTimeout { tx_hash: TxHash, timeout: Duration },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Contract call failed: {0}")]
    Contract(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}

/// Parameters of one token transfer from the sender to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub to: Address,
    pub amount: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub nonce: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    pub raw: Bytes,
    pub hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub gas_used: U256,
    pub effective_gas_price: U256,
    /// Full node representation of the receipt, for failure reports.
    pub detail: String,
}

impl TransferReceipt {
    /// Fee actually paid, in wei.
    pub fn fee(&self) -> U256 {
        self.gas_used.saturating_mul(self.effective_gas_price)
    }
}

/// A decoded ERC-20 `Transfer` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub transaction_hash: TxHash,
}

/// Incremental feed of transfer events; each call returns what arrived since
/// the previous one.
#[async_trait]
pub trait TransferEventSource: Send {
    async fn next_batch(&mut self) -> Result<Vec<TransferEvent>, LedgerError>;
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Monitored address; derived from the signing key.
    fn sender(&self) -> Address;

    /// Address the token balance is forwarded to.
    fn recipient(&self) -> Address;

    async fn native_balance(&self) -> Result<U256, LedgerError>;

    async fn token_balance(&self) -> Result<U256, LedgerError>;

    async fn gas_price(&self) -> Result<U256, LedgerError>;

    async fn estimate_transfer_gas(&self, amount: U256) -> Result<U256, LedgerError>;

    /// Transaction count at the latest mined block. A transfer still waiting
    /// in the mempool keeps this value, so a retry signed with it replaces
    /// the stuck transaction instead of queueing behind it.
    async fn latest_nonce(&self) -> Result<U256, LedgerError>;

    async fn sign_transfer(&self, request: &TransferRequest) -> Result<SignedTransfer, LedgerError>;

    async fn submit(&self, transfer: &SignedTransfer) -> Result<TxHash, LedgerError>;

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Human-readable dump of a transaction as the node reports it.
    async fn describe_transaction(&self, tx_hash: TxHash) -> Result<String, LedgerError>;

    async fn subscribe_transfers(
        &self,
        from: BlockNumber,
    ) -> Result<Box<dyn TransferEventSource>, LedgerError>;
}
