use anyhow::{Context, Result};
use config::{Config, Environment, File};
use core_logic::{ChainConfig, ConfigError, GasConfig, GasConfigToml, MailConfig, WalletSource};
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::time::Duration;

use crate::controller::SweepSettings;
use crate::monitor::MonitorSettings;

/// Real tokens use at most 18 decimals. At 36 the threshold `min_amount_to_send * 10^decimals`
/// still fits a `U256` for any `u64` minimum, so a larger value is a typo.
const MAX_DECIMALS: u32 = 36;

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    pub contract_address: String,
}

fn default_symbol() -> String {
    "HEX".to_string()
}

fn default_decimals() -> u32 {
    8
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalletConfig {
    #[serde(default)]
    pub source: WalletSource,
    /// Overrides the recipient found on the second line of a secrets file.
    pub recipient: Option<String>,
    #[serde(default = "default_true")]
    pub wipe_secrets_file: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    #[serde(default = "default_min_amount")]
    pub min_amount_to_send: u64,
    #[serde(flatten)]
    pub gas: GasConfigToml,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_funding_poll")]
    pub funding_poll_secs: u64,
    pub max_attempts: Option<u32>,
}

fn default_min_amount() -> u64 {
    100
}

fn default_retry_delay() -> u64 {
    10
}

fn default_receipt_timeout() -> u64 {
    60
}

fn default_funding_poll() -> u64 {
    20
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_amount_to_send: default_min_amount(),
            gas: GasConfigToml::default(),
            retry_delay_secs: default_retry_delay(),
            receipt_timeout_secs: default_receipt_timeout(),
            funding_poll_secs: default_funding_poll(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_report_hour")]
    pub report_hour: u32,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_report_hour() -> u32 {
    12
}

fn default_restart_delay() -> u64 {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            report_hour: default_report_hour(),
            restart_delay_secs: default_restart_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_price_url")]
    pub url: String,
}

fn default_price_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd".to_string()
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_price_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    pub chain: ChainConfig,
    pub token: TokenConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub price: PriceConfig,
}

impl SweeperConfig {
    /// Loads `path` (optional, TOML) and overlays `SWEEPER_*` environment
    /// variables, e.g. `SWEEPER_MAIL__PASSWORD` sets `mail.password`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SWEEPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        self.mail.validate()?;
        self.contract_address()?;
        if self.token.decimals > MAX_DECIMALS {
            return Err(ConfigError::invalid(
                "token.decimals",
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }
        if self.monitor.report_hour > 23 {
            return Err(ConfigError::invalid(
                "monitor.report_hour",
                "must be between 0 and 23",
            ));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "monitor.poll_interval_secs",
                "must be at least 1",
            ));
        }
        if self.sweep.max_attempts == Some(0) {
            return Err(ConfigError::invalid(
                "sweep.max_attempts",
                "must be at least 1 when set",
            ));
        }
        let gas = self.gas_config();
        if gas.bonus_floor_gwei < 0.0 || gas.bonus_step_gwei < 0.0 {
            return Err(ConfigError::invalid(
                "sweep.bonus_gas_price_gwei",
                "gas bonuses cannot be negative",
            ));
        }
        Ok(())
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        parse_address("token.contract_address", &self.token.contract_address)
    }

    pub fn gas_config(&self) -> GasConfig {
        self.sweep.gas.clone().into()
    }

    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            min_amount_to_send: U256::from(self.sweep.min_amount_to_send),
            gas: self.gas_config(),
            retry_delay: Duration::from_secs(self.sweep.retry_delay_secs),
            receipt_timeout: Duration::from_secs(self.sweep.receipt_timeout_secs),
            funding_poll_interval: Duration::from_secs(self.sweep.funding_poll_secs),
            max_attempts: self.sweep.max_attempts,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
            report_hour: self.monitor.report_hour,
        }
    }
}

pub fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::missing(field));
    }
    value
        .parse::<Address>()
        .map_err(|e| ConfigError::invalid(field, format!("'{}' is not an address: {}", value, e)))
}
