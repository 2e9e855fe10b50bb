use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use core_logic::{setup_logger, SecurityUtils, Supervisor, WalletSecrets, WalletSource};
use dialoguer::{theme::ColorfulTheme, Password};
use dotenv::dotenv;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use token_sweeper::config::{parse_address, SweeperConfig};
use token_sweeper::ledger::{EvmLedger, LedgerClient};
use token_sweeper::notifier::{notify, Notification, Notifier, SmtpNotifier};
use token_sweeper::price::{CoinGeckoFeed, NoPriceFeed, PriceFeed};
use token_sweeper::{EventMonitor, ReportContext, TokenInfo, TransferController};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "sweeper.toml", env = "SWEEPER_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guard = setup_logger("logs", "sweeper")?;

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let config = SweeperConfig::load(&args.config).map_err(|e| {
        error!("Failed to load config: {:#}", e);
        e
    })?;
    info!(
        "Configuration loaded for chain ID: {}, token {} at {}",
        config.chain.chain_id, config.token.symbol, config.token.contract_address
    );

    let secrets = load_secrets(&config)?;
    let wallet = secrets
        .private_key
        .trim()
        .parse::<LocalWallet>()
        .context("Invalid private key")?;
    let recipient = resolve_recipient(&config, &secrets)?;
    let contract = config.contract_address()?;
    info!("Monitoring {:?}, forwarding to {:?}", wallet.address(), recipient);

    let report = ReportContext {
        started_at: Local::now(),
        version: VERSION.to_string(),
        control_key: SecurityUtils::mask(&secrets.private_key),
        control_recipient: SecurityUtils::mask(&format!("{:?}", recipient)),
    };
    drop(secrets);

    let notifier: Arc<dyn Notifier> =
        Arc::new(SmtpNotifier::new(&config.mail).context("Failed to set up mailer")?);
    let prices: Arc<dyn PriceFeed> = if config.price.enabled {
        Arc::new(CoinGeckoFeed::new(config.price.url.clone())?)
    } else {
        Arc::new(NoPriceFeed)
    };

    info!("Started ver. {}", VERSION);
    notify(
        notifier.as_ref(),
        Notification::Started {
            version: VERSION.to_string(),
        },
    )
    .await;

    let supervisor = Supervisor::new(
        "monitor",
        Duration::from_secs(config.monitor.restart_delay_secs),
    );
    let supervised = supervisor.run(|run| {
        if run > 0 {
            info!("Reinitializing after failure");
        }
        run_monitor(
            config.clone(),
            wallet.clone(),
            contract,
            recipient,
            notifier.clone(),
            prices.clone(),
            report.clone(),
        )
    });

    tokio::select! {
        result = supervised => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            Ok(())
        }
    }
}

/// One life of the monitor: fresh ledger connection, controller and gate state.
async fn run_monitor(
    config: SweeperConfig,
    wallet: LocalWallet,
    contract: Address,
    recipient: Address,
    notifier: Arc<dyn Notifier>,
    prices: Arc<dyn PriceFeed>,
    report: ReportContext,
) -> Result<()> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(
        EvmLedger::connect(
            &config.chain.rpc_url,
            config.chain.chain_id,
            wallet,
            contract,
            recipient,
        )
        .await
        .context("Failed to connect to RPC endpoint")?,
    );
    let controller = TransferController::new(
        ledger.clone(),
        notifier.clone(),
        prices.clone(),
        TokenInfo {
            symbol: config.token.symbol.clone(),
            decimals: config.token.decimals,
        },
        config.sweep_settings(),
    );
    let mut monitor = EventMonitor::new(
        controller,
        ledger,
        notifier,
        prices,
        config.monitor_settings(),
        report,
    );
    monitor.run().await
}

fn load_secrets(config: &SweeperConfig) -> Result<WalletSecrets> {
    let password = match &config.wallet.source {
        WalletSource::File {
            encrypted: true, ..
        } => Some(wallet_password()?),
        _ => None,
    };
    let secrets = SecurityUtils::load_wallet_secrets(
        &config.wallet.source,
        password.as_deref(),
        config.wallet.wipe_secrets_file,
    )
    .context("Failed to load wallet secrets")?;
    if let WalletSource::File {
        path,
        encrypted: false,
    } = &config.wallet.source
    {
        if config.wallet.wipe_secrets_file {
            warn!("Secrets file {} has been wiped; restore it before the next start", path);
        }
    }
    Ok(secrets)
}

fn wallet_password() -> Result<String> {
    if let Ok(password) = std::env::var("WALLET_PASSWORD") {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("WALLET_PASSWORD is not set and no terminal is attached");
    }
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Wallet password")
        .interact()
        .context("Failed to read wallet password")
}

fn resolve_recipient(config: &SweeperConfig, secrets: &WalletSecrets) -> Result<Address> {
    let value = config
        .wallet
        .recipient
        .as_deref()
        .or(secrets.recipient.as_deref())
        .unwrap_or_default();
    Ok(parse_address("wallet.recipient", value)?)
}
