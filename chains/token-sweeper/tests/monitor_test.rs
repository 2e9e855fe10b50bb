mod common;

use chrono::{Duration as ChronoDuration, Local, Timelike};
use common::*;
use ethers::types::{Address, TxHash, U256};
use std::sync::Arc;
use std::time::Duration;
use token_sweeper::ledger::TransferEvent;
use token_sweeper::notifier::Notification;
use token_sweeper::{EventMonitor, MonitorSettings, ReportContext, TransferController};

struct MonitorHarness {
    ledger: Arc<FakeLedger>,
    notifier: Arc<RecordingNotifier>,
    monitor: EventMonitor,
}

fn monitor(ledger: FakeLedger) -> MonitorHarness {
    monitor_with_report_hour(ledger, 12)
}

fn monitor_with_report_hour(ledger: FakeLedger, report_hour: u32) -> MonitorHarness {
    let ledger = Arc::new(ledger);
    let notifier = Arc::new(RecordingNotifier::default());
    let prices = Arc::new(FixedPrice(Some(2000.0)));
    let controller = TransferController::new(
        ledger.clone(),
        notifier.clone(),
        prices.clone(),
        hex_token(),
        fast_settings(),
    );
    let report = ReportContext {
        started_at: Local::now() - ChronoDuration::minutes(26 * 60 + 5),
        version: "1.2.3".to_string(),
        control_key: "0x4c08...2961".to_string(),
        control_recipient: "0x0000...0b0b".to_string(),
    };
    let monitor = EventMonitor::new(
        controller,
        ledger.clone(),
        notifier.clone(),
        prices,
        MonitorSettings {
            poll_interval: Duration::from_millis(1),
            report_hour,
        },
        report,
    );
    MonitorHarness {
        ledger,
        notifier,
        monitor,
    }
}

fn transfer(to: Address, value: U256, hash: u64) -> TransferEvent {
    TransferEvent {
        from: Address::from_low_u64_be(0xF00D),
        to,
        value,
        transaction_hash: TxHash::from_low_u64_be(hash),
    }
}

#[tokio::test]
async fn test_incoming_transfer_triggers_sweep() {
    let mut h = monitor(FakeLedger::new(tokens(150)));
    let mut source = ScriptedSource::new(vec![vec![transfer(sender(), tokens(150), 0xAA)]]);

    let received = h.monitor.poll_events(&mut source).await.unwrap();

    assert_eq!(received, 1);
    assert_eq!(h.notifier.kinds(), vec!["tokens_received", "transfer_success"]);
    match &h.notifier.sent()[0] {
        Notification::TokensReceived {
            amount,
            symbol,
            tx_hash,
        } => {
            assert_eq!(amount, "150");
            assert_eq!(symbol, "HEX");
            assert_eq!(tx_hash, &format!("{:?}", TxHash::from_low_u64_be(0xAA)));
        }
        other => panic!("unexpected notification: {:?}", other),
    }
    assert_eq!(h.ledger.requests().len(), 1);
}

#[tokio::test]
async fn test_transfers_to_other_addresses_ignored() {
    let mut h = monitor(FakeLedger::new(tokens(150)));
    let mut source = ScriptedSource::new(vec![vec![
        transfer(recipient(), tokens(150), 1),
        transfer(Address::from_low_u64_be(0xDEAD), tokens(500), 2),
    ]]);

    let received = h.monitor.poll_events(&mut source).await.unwrap();

    assert_eq!(received, 0);
    assert!(h.notifier.sent().is_empty());
    assert!(h.ledger.requests().is_empty());
}

#[tokio::test]
async fn test_small_incoming_transfer_notified_but_not_swept() {
    let mut h = monitor(FakeLedger::new(tokens(20)));
    let mut source = ScriptedSource::new(vec![vec![transfer(sender(), tokens(20), 3)]]);

    let received = h.monitor.poll_events(&mut source).await.unwrap();

    assert_eq!(received, 1);
    assert_eq!(h.notifier.kinds(), vec!["tokens_received"]);
    assert!(h.ledger.requests().is_empty());
}

#[tokio::test]
async fn test_empty_batch() {
    let mut h = monitor(FakeLedger::new(tokens(150)));
    let mut source = ScriptedSource::default();

    assert_eq!(h.monitor.poll_events(&mut source).await.unwrap(), 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_daily_report_fires_once_per_report_hour() {
    let mut h = monitor(FakeLedger::new(tokens(42)));

    assert!(!h.monitor.tick_report(11).await.unwrap());
    assert!(h.monitor.tick_report(12).await.unwrap());
    assert!(!h.monitor.tick_report(12).await.unwrap());
    assert!(h.monitor.state().reported_today);
    assert!(!h.monitor.tick_report(13).await.unwrap());
    assert!(!h.monitor.state().reported_today);
    assert!(h.monitor.tick_report(12).await.unwrap());

    assert_eq!(h.notifier.count("daily_report"), 2);
}

#[tokio::test]
async fn test_daily_report_contents() {
    let h = monitor(FakeLedger::new(tokens(42)).with_native_balances(&[U256::exp10(18)]));

    h.monitor.send_daily_report().await.unwrap();

    match h.notifier.sent().as_slice() {
        [Notification::DailyReport(report)] => {
            assert_eq!(report.version, "1.2.3");
            assert_eq!(report.uptime_days, 1);
            assert_eq!(report.uptime_hours, 2);
            assert_eq!(report.uptime_minutes, 5);
            assert_eq!(report.eth_balance, "1.00000");
            assert_eq!(report.eth_balance_usd, "2000.00");
            assert_eq!(report.token_balance, "42");
            assert_eq!(report.token_symbol, "HEX");
            assert_eq!(report.control_key, "0x4c08...2961");
        }
        other => panic!("unexpected notifications: {:?}", other),
    }
}

#[tokio::test]
async fn test_run_sweeps_before_polling_and_fails_on_lost_filter() {
    let ledger = FakeLedger::new(tokens(150)).with_subscription(ScriptedSource::failing_after(
        vec![vec![transfer(sender(), tokens(5), 0xBB)]],
    ));
    // Keep the daily report out of the way.
    let quiet_hour = (Local::now().hour() + 12) % 24;
    let mut h = monitor_with_report_hour(ledger, quiet_hour);

    let err = h.monitor.run().await.unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to fetch Transfer events"));
    assert_eq!(h.ledger.requests().len(), 1);
    assert_eq!(h.ledger.requests()[0].amount, tokens(150));
    assert_eq!(h.notifier.kinds(), vec!["transfer_success", "tokens_received"]);
}
