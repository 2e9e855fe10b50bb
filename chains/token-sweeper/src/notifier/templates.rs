//! HTML bodies for the notification emails. Each body opens with the time it
//! was rendered, in bold.

use super::{DailyReport, Notification};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

pub fn render(notification: &Notification, now: &str) -> RenderedMessage {
    let (subject, content) = match notification {
        Notification::Started { version } => (
            "SCRIPT STARTED!".to_string(),
            format!("<h2>Script ver. <mark>{}</mark> started!</h2>", version),
        ),
        Notification::InsufficientBalance {
            address,
            current_eth,
            required_eth,
            required_usd,
        } => (
            "Error! Insufficient balance!".to_string(),
            format!(
                "<h2>Please fund your wallet <mark>{}</mark> with ETH\n\
                 Your current balance: <mark>{} ETH</mark>\n\
                 Required: <mark>{} ETH (${})</mark></h2>",
                address, current_eth, required_eth, required_usd
            ),
        ),
        Notification::TokensReceived {
            amount,
            symbol,
            tx_hash,
        } => (
            format!("{} TOKENS RECEIVED!", symbol),
            format!(
                "<h2><mark>{}</mark> {} received.\nTx hash: <mark>{}</mark></h2>",
                amount, symbol, tx_hash
            ),
        ),
        Notification::TransferSuccess {
            amount,
            symbol,
            from,
            to,
            tx_hash,
            fee_eth,
            fee_usd,
        } => (
            "TRANSFER SUCCESS!".to_string(),
            format!(
                "<h2><mark>{}</mark> {} transferred from <mark>{}</mark>\n\
                 to <mark>{}</mark>\n\n\
                 Tx hash: <mark>{}</mark>\n\
                 Tx Fee: <mark>{}</mark> ETH ($<mark>{}</mark>)</h2>",
                amount, symbol, from, to, tx_hash, fee_eth, fee_usd
            ),
        ),
        Notification::TransferFailed {
            tx_hash,
            transaction,
            receipt,
        } => (
            "Error! Transaction Failed!".to_string(),
            format!(
                "<h2>Tx hash <mark>{}</mark>\nTx: {}\nReceipt: {}</h2>",
                tx_hash, transaction, receipt
            ),
        ),
        Notification::DelayedTransferSuccess {
            amount,
            symbol,
            from,
            to,
            tx_hash,
        } => (
            "DELAYED TRANSFER SUCCESS!".to_string(),
            format!(
                "<h2><mark>{}</mark> {} transferred from <mark>{}</mark>\n\
                 to <mark>{}</mark>\n\n\
                 Tx hash: <mark>{}</mark></h2>",
                amount,
                symbol,
                from,
                to,
                tx_hash.as_deref().unwrap_or("unknown")
            ),
        ),
        Notification::DailyReport(report) => ("DAILY REPORT".to_string(), daily_report(report)),
    };

    RenderedMessage {
        subject,
        body: format!("<strong>{}</strong>\n{}\n", now, content),
    }
}

fn daily_report(report: &DailyReport) -> String {
    format!(
        "<h2>Status: Running\n\
         Started: <mark>{}</mark>\n\
         Uptime: <mark>{}d {}h {}m</mark>\n\
         Script ver. <mark>{}</mark>\n\n\
         Control1: <mark>{}</mark>\n\
         Control2: <mark>{}</mark>\n\n\
         ETH balance: <mark>{} (${})</mark>\n\
         {} balance: <mark>{}</mark></h2>",
        report.started_at,
        report.uptime_days,
        report.uptime_hours,
        report.uptime_minutes,
        report.version,
        report.control_key,
        report.control_recipient,
        report.eth_balance,
        report.eth_balance_usd,
        report.token_symbol,
        report.token_balance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2024-01-01 12:00:00";

    #[test]
    fn test_tokens_received_subject_uses_symbol() {
        let message = render(
            &Notification::TokensReceived {
                amount: "150".into(),
                symbol: "HEX".into(),
                tx_hash: "0xabc".into(),
            },
            NOW,
        );
        assert_eq!(message.subject, "HEX TOKENS RECEIVED!");
        assert!(message.body.starts_with("<strong>2024-01-01 12:00:00</strong>"));
        assert!(message.body.contains("<mark>150</mark> HEX received."));
    }

    #[test]
    fn test_transfer_success_body() {
        let message = render(
            &Notification::TransferSuccess {
                amount: "150".into(),
                symbol: "HEX".into(),
                from: "0xfrom".into(),
                to: "0xto".into(),
                tx_hash: "0xhash".into(),
                fee_eth: "0.001639".into(),
                fee_usd: "n/a".into(),
            },
            NOW,
        );
        assert_eq!(message.subject, "TRANSFER SUCCESS!");
        assert!(message.body.contains("Tx Fee: <mark>0.001639</mark> ETH ($<mark>n/a</mark>)"));
    }

    #[test]
    fn test_delayed_without_hash() {
        let message = render(
            &Notification::DelayedTransferSuccess {
                amount: "150".into(),
                symbol: "HEX".into(),
                from: "0xfrom".into(),
                to: "0xto".into(),
                tx_hash: None,
            },
            NOW,
        );
        assert!(message.body.contains("Tx hash: <mark>unknown</mark>"));
    }

    #[test]
    fn test_daily_report_uptime() {
        let message = render(
            &Notification::DailyReport(DailyReport {
                started_at: "2024-01-01 00:00:00".into(),
                uptime_days: 1,
                uptime_hours: 2,
                uptime_minutes: 3,
                version: "1.0.0".into(),
                control_key: "0x1234...abcd".into(),
                control_recipient: "0x5678...ef01".into(),
                eth_balance: "0.12345".into(),
                eth_balance_usd: "370.35".into(),
                token_balance: "12.5".into(),
                token_symbol: "HEX".into(),
            }),
            NOW,
        );
        assert_eq!(message.subject, "DAILY REPORT");
        assert!(message.body.contains("Uptime: <mark>1d 2h 3m</mark>"));
        assert!(message.body.contains("HEX balance: <mark>12.5</mark>"));
    }
}
