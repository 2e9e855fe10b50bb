//! # Event Monitor
//!
//! Polls the token's `Transfer` events, sweeps after every transfer into the
//! monitored wallet and sends the daily status report.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Timelike};
use ethers::types::BlockNumber;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::controller::TransferController;
use crate::ledger::{LedgerClient, TransferEventSource};
use crate::notifier::{notify, DailyReport, Notification, Notifier};
use crate::notifier::templates::TIMESTAMP_FORMAT;
use crate::price::PriceFeed;
use crate::units::{format_token_amount, format_usd, format_wei};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Local hour (0-23) during which the daily report goes out.
    pub report_hour: u32,
}

/// Daily report gate. Recreated on every restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub reported_today: bool,
}

impl MonitorState {
    /// Whether a report is owed at `hour`. Leaving the report hour re-arms the gate.
    pub fn should_report(&mut self, hour: u32, report_hour: u32) -> bool {
        if hour != report_hour {
            self.reported_today = false;
            return false;
        }
        !self.reported_today
    }

    pub fn mark_reported(&mut self) {
        self.reported_today = true;
    }
}

/// Process-wide facts quoted in the daily report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub started_at: DateTime<Local>,
    pub version: String,
    /// Masked private key.
    pub control_key: String,
    /// Masked recipient address.
    pub control_recipient: String,
}

pub struct EventMonitor {
    controller: TransferController,
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
    prices: Arc<dyn PriceFeed>,
    settings: MonitorSettings,
    report: ReportContext,
    state: MonitorState,
}

impl EventMonitor {
    pub fn new(
        controller: TransferController,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn Notifier>,
        prices: Arc<dyn PriceFeed>,
        settings: MonitorSettings,
        report: ReportContext,
    ) -> Self {
        Self {
            controller,
            ledger,
            notifier,
            prices,
            settings,
            report,
            state: MonitorState::default(),
        }
    }

    pub fn controller(&self) -> &TransferController {
        &self.controller
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Subscribes from the latest block, sweeps once, then polls forever.
    /// Returns only on error.
    pub async fn run(&mut self) -> Result<()> {
        let mut source = self
            .ledger
            .subscribe_transfers(BlockNumber::Latest)
            .await
            .context("Failed to create Transfer event filter")?;

        self.controller.sweep().await.context("Initial sweep failed")?;

        info!("In event monitoring loop");
        loop {
            self.poll_events(source.as_mut()).await?;
            sleep(self.settings.poll_interval).await;
            self.tick_report(Local::now().hour()).await?;
        }
    }

    /// Handles one batch of events; returns how many were addressed to the
    /// monitored wallet.
    pub async fn poll_events<S>(&mut self, source: &mut S) -> Result<usize>
    where
        S: TransferEventSource + ?Sized,
    {
        let events = source
            .next_batch()
            .await
            .context("Failed to fetch Transfer events")?;

        let sender = self.ledger.sender();
        let token = self.controller.token().clone();
        let mut received = 0;

        for event in events.into_iter().filter(|event| event.to == sender) {
            info!("New Transfer Event: {:?}", event);
            let amount = format_token_amount(event.value, token.decimals);
            info!("{} received: {}", token.symbol, amount);

            notify(
                self.notifier.as_ref(),
                Notification::TokensReceived {
                    amount,
                    symbol: token.symbol.clone(),
                    tx_hash: format!("{:?}", event.transaction_hash),
                },
            )
            .await;

            self.controller.sweep().await.context("Sweep failed")?;
            received += 1;
        }
        Ok(received)
    }

    /// Sends the daily report if `hour` is the report hour and it has not
    /// gone out yet. Returns whether a report was sent.
    pub async fn tick_report(&mut self, hour: u32) -> Result<bool> {
        if !self.state.should_report(hour, self.settings.report_hour) {
            return Ok(false);
        }
        self.send_daily_report().await?;
        self.state.mark_reported();
        Ok(true)
    }

    pub async fn send_daily_report(&self) -> Result<()> {
        info!("Daily report sending");
        let uptime = Local::now() - self.report.started_at;
        let token = self.controller.token();

        let eth_balance = self
            .ledger
            .native_balance()
            .await
            .context("Failed to read ETH balance for report")?;
        let token_balance = self
            .ledger
            .token_balance()
            .await
            .context("Failed to read token balance for report")?;
        let price = self.prices.eth_usd().await;

        let report = DailyReport {
            started_at: self.report.started_at.format(TIMESTAMP_FORMAT).to_string(),
            uptime_days: uptime.num_days(),
            uptime_hours: uptime.num_hours() % 24,
            uptime_minutes: uptime.num_minutes() % 60,
            version: self.report.version.clone(),
            control_key: self.report.control_key.clone(),
            control_recipient: self.report.control_recipient.clone(),
            eth_balance: format_wei(eth_balance, 5),
            eth_balance_usd: format_usd(eth_balance, price),
            token_balance: format_token_amount(token_balance, token.decimals),
            token_symbol: token.symbol.clone(),
        };

        notify(self.notifier.as_ref(), Notification::DailyReport(report)).await;
        Ok(())
    }
}
