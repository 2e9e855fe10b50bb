//! Ethers-based [`LedgerClient`] for EVM chains.
//!
//! Transfers are legacy (gas-price) transactions built from the token's
//! `transfer` call, signed locally and pushed with `eth_sendRawTransaction`.
//! Incoming transfers are read through an `eth_newFilter` log filter.

use async_trait::async_trait;
use ethers::{
    contract::{abigen, parse_log},
    providers::{FilterKind, Http, Middleware, Provider, ProviderError, RpcError},
    signers::{LocalWallet, Signer},
    types::{Address, BlockNumber, Log, TxHash, U256, U64},
    utils::keccak256,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    LedgerClient, LedgerError, SignedTransfer, TransferEvent, TransferEventSource,
    TransferReceipt, TransferRequest,
};

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
        event Transfer(address indexed from, address indexed to, uint256 value)
    ]"#,
);

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct EvmLedger {
    provider: Arc<Provider<Http>>,
    wallet: LocalWallet,
    token: Erc20Token<Provider<Http>>,
    recipient: Address,
}

impl EvmLedger {
    /// Connects to `rpc_url` and checks that the node serves `chain_id`.
    pub async fn connect(
        rpc_url: &str,
        chain_id: u64,
        wallet: LocalWallet,
        contract: Address,
        recipient: Address,
    ) -> Result<Self, LedgerError> {
        info!("Connecting to {} (chain {})", rpc_url, chain_id);

        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| LedgerError::Transport(format!("Invalid RPC endpoint: {}", e)))?;
        let provider = Arc::new(provider);

        let actual = provider.get_chainid().await.map_err(transport)?;
        if actual != U256::from(chain_id) {
            return Err(LedgerError::ChainIdMismatch {
                expected: chain_id,
                actual: actual.low_u64(),
            });
        }

        let token = Erc20Token::new(contract, provider.clone());

        Ok(Self {
            provider,
            wallet: wallet.with_chain_id(chain_id),
            token,
            recipient,
        })
    }
}

fn transport(err: ProviderError) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

fn contract_err(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Contract(err.to_string())
}

/// Maps an `eth_sendRawTransaction` failure onto the ledger taxonomy.
fn classify_submit_error(err: ProviderError) -> LedgerError {
    match err.as_error_response() {
        Some(rpc) if rpc.message.to_lowercase().contains("insufficient") => {
            LedgerError::InsufficientFunds {
                message: rpc.message.clone(),
            }
        }
        Some(rpc) => LedgerError::Rejected {
            code: rpc.code,
            message: rpc.message.clone(),
        },
        None => transport(err),
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    fn sender(&self) -> Address {
        self.wallet.address()
    }

    fn recipient(&self) -> Address {
        self.recipient
    }

    async fn native_balance(&self) -> Result<U256, LedgerError> {
        self.provider
            .get_balance(self.sender(), None)
            .await
            .map_err(transport)
    }

    async fn token_balance(&self) -> Result<U256, LedgerError> {
        self.token
            .balance_of(self.sender())
            .call()
            .await
            .map_err(contract_err)
    }

    async fn gas_price(&self) -> Result<U256, LedgerError> {
        self.provider.get_gas_price().await.map_err(transport)
    }

    async fn estimate_transfer_gas(&self, amount: U256) -> Result<U256, LedgerError> {
        self.token
            .transfer(self.recipient, amount)
            .from(self.sender())
            .estimate_gas()
            .await
            .map_err(contract_err)
    }

    async fn latest_nonce(&self) -> Result<U256, LedgerError> {
        self.provider
            .get_transaction_count(self.sender(), Some(BlockNumber::Latest.into()))
            .await
            .map_err(transport)
    }

    async fn sign_transfer(&self, request: &TransferRequest) -> Result<SignedTransfer, LedgerError> {
        let mut tx = self
            .token
            .transfer(request.to, request.amount)
            .from(self.sender())
            .legacy()
            .tx;
        tx.set_gas(request.gas_limit);
        tx.set_gas_price(request.gas_price);
        tx.set_nonce(request.nonce);
        tx.set_chain_id(self.wallet.chain_id());

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);
        let hash = TxHash::from(keccak256(&raw));

        Ok(SignedTransfer { raw, hash })
    }

    async fn submit(&self, transfer: &SignedTransfer) -> Result<TxHash, LedgerError> {
        let pending = self
            .provider
            .send_raw_transaction(transfer.raw.clone())
            .await
            .map_err(classify_submit_error)?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TransferReceipt, LedgerError> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => debug!("Receipt for {:?} not available yet", tx_hash),
                    Err(e) => return Err(transport(e)),
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };

        let receipt = tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| LedgerError::ReceiptTimeout { tx_hash, timeout })??;

        let detail = serde_json::to_string(&receipt).unwrap_or_else(|_| format!("{:?}", receipt));
        Ok(TransferReceipt {
            tx_hash,
            success: receipt.status == Some(U64::from(1)),
            gas_used: receipt.gas_used.unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price.unwrap_or_default(),
            detail,
        })
    }

    async fn describe_transaction(&self, tx_hash: TxHash) -> Result<String, LedgerError> {
        let tx = self
            .provider
            .get_transaction(tx_hash)
            .await
            .map_err(transport)?;
        Ok(match tx {
            Some(tx) => serde_json::to_string(&tx).unwrap_or_else(|_| format!("{:?}", tx)),
            None => format!("{:?} not found", tx_hash),
        })
    }

    async fn subscribe_transfers(
        &self,
        from: BlockNumber,
    ) -> Result<Box<dyn TransferEventSource>, LedgerError> {
        let filter = self.token.transfer_filter().from_block(from).filter;
        let filter_id = self
            .provider
            .new_filter(FilterKind::Logs(&filter))
            .await
            .map_err(transport)?;
        info!("Subscribed to Transfer events (filter {:#x})", filter_id);

        Ok(Box::new(EvmTransferSource {
            provider: self.provider.clone(),
            filter_id,
        }))
    }
}

/// Polls an installed log filter with `eth_getFilterChanges`.
pub struct EvmTransferSource {
    provider: Arc<Provider<Http>>,
    filter_id: U256,
}

#[async_trait]
impl TransferEventSource for EvmTransferSource {
    async fn next_batch(&mut self) -> Result<Vec<TransferEvent>, LedgerError> {
        let logs: Vec<Log> = self
            .provider
            .get_filter_changes(self.filter_id)
            .await
            .map_err(transport)?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let tx_hash = log.transaction_hash.unwrap_or_default();
            match parse_log::<TransferFilter>(log) {
                Ok(transfer) => events.push(TransferEvent {
                    from: transfer.from,
                    to: transfer.to,
                    value: transfer.value,
                    transaction_hash: tx_hash,
                }),
                Err(e) => warn!("Skipping undecodable Transfer log in {:?}: {}", tx_hash, e),
            }
        }
        Ok(events)
    }
}
