//! # Token Sweeper
//!
//! Watches a wallet for incoming ERC-20 transfers and forwards the balance to
//! a second address once it reaches a minimum, emailing the operator along
//! the way.
//!
//! - [`ledger`] - chain access behind the [`ledger::LedgerClient`] trait
//! - [`controller`] - balance-triggered transfers with gas escalation
//! - [`monitor`] - event polling and the daily report
//! - [`notifier`] - email notifications
//! - [`price`] - ETH/USD quotes

pub mod config;
pub mod controller;
pub mod ledger;
pub mod monitor;
pub mod notifier;
pub mod price;
pub mod units;

pub use config::SweeperConfig;
pub use controller::{
    AttemptOutcome, ControllerState, SweepSettings, SweepSummary, TokenInfo, TransferAttempt,
    TransferController,
};
pub use monitor::{EventMonitor, MonitorSettings, MonitorState, ReportContext};
