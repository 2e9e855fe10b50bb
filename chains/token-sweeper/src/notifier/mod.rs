//! # Notifier
//!
//! Status messages sent to the operator. The controller and the monitor
//! only build [`Notification`] values; rendering lives in [`templates`] and
//! delivery behind the [`Notifier`] trait.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod smtp;
pub mod templates;

pub use smtp::SmtpNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid mail address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Figures for the daily status email.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub started_at: String,
    pub uptime_days: i64,
    pub uptime_hours: i64,
    pub uptime_minutes: i64,
    pub version: String,
    pub control_key: String,
    pub control_recipient: String,
    pub eth_balance: String,
    pub eth_balance_usd: String,
    pub token_balance: String,
    pub token_symbol: String,
}

/// Every message the sweeper can send. Amounts are pre-formatted strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Started {
        version: String,
    },
    InsufficientBalance {
        address: String,
        current_eth: String,
        required_eth: String,
        required_usd: String,
    },
    TokensReceived {
        amount: String,
        symbol: String,
        tx_hash: String,
    },
    TransferSuccess {
        amount: String,
        symbol: String,
        from: String,
        to: String,
        tx_hash: String,
        fee_eth: String,
        fee_usd: String,
    },
    TransferFailed {
        tx_hash: String,
        transaction: String,
        receipt: String,
    },
    DelayedTransferSuccess {
        amount: String,
        symbol: String,
        from: String,
        to: String,
        tx_hash: Option<String>,
    },
    DailyReport(DailyReport),
}

impl Notification {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Started { .. } => "started",
            Notification::InsufficientBalance { .. } => "insufficient_balance",
            Notification::TokensReceived { .. } => "tokens_received",
            Notification::TransferSuccess { .. } => "transfer_success",
            Notification::TransferFailed { .. } => "transfer_failed",
            Notification::DelayedTransferSuccess { .. } => "delayed_transfer_success",
            Notification::DailyReport(_) => "daily_report",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sends `notification` and logs a delivery failure instead of returning it.
pub async fn notify(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.send(&notification).await {
        warn!("Failed to send {} notification: {}", notification.kind(), e);
    }
}
