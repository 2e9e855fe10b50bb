//! # Core Logic - Gas Configuration
//!
//! Gas pricing knobs shared by transfer submitters: a bonus added on top of
//! the network gas price, the step it is escalated by after a failure, and a
//! fixed allowance added to every gas estimate.

use serde::Deserialize;

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Configuration for gas management
#[derive(Debug, Clone, PartialEq)]
pub struct GasConfig {
    /// Bonus gas price (gwei) used after a success; the escalation floor.
    pub bonus_floor_gwei: f64,
    /// Amount (gwei) the bonus grows by after each failed attempt.
    pub bonus_step_gwei: f64,
    /// Units added to every gas limit estimate.
    pub limit_bonus: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            bonus_floor_gwei: 2.0,
            bonus_step_gwei: 2.0,
            limit_bonus: 10_000,
        }
    }
}

impl GasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bonus_floor(mut self, gwei: f64) -> Self {
        self.bonus_floor_gwei = gwei;
        self
    }

    pub fn with_bonus_step(mut self, gwei: f64) -> Self {
        self.bonus_step_gwei = gwei;
        self
    }

    pub fn with_limit_bonus(mut self, units: u64) -> Self {
        self.limit_bonus = units;
        self
    }

    pub fn bonus_floor_wei(&self) -> u128 {
        gwei_to_wei(self.bonus_floor_gwei)
    }

    pub fn bonus_step_wei(&self) -> u128 {
        gwei_to_wei(self.bonus_step_gwei)
    }
}

/// Convert gwei to wei. Negative input saturates to zero.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * WEI_PER_GWEI as f64).round().max(0.0) as u128
}

/// Formats a wei amount as ether with a fixed number of decimals (truncating).
pub fn format_ether(wei: u128, decimals: usize) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;
    if decimals == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:018}", frac);
    let shown = &frac_str[..decimals.min(18)];
    format!("{}.{:0<width$}", whole, shown, width = decimals)
}

/// Deserialize helper for GasConfig from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasConfigToml {
    pub bonus_gas_price_gwei: Option<f64>,
    pub bonus_gas_step_gwei: Option<f64>,
    pub gas_limit_bonus: Option<u64>,
}

impl From<GasConfigToml> for GasConfig {
    fn from(toml: GasConfigToml) -> Self {
        let defaults = GasConfig::default();
        Self {
            bonus_floor_gwei: toml.bonus_gas_price_gwei.unwrap_or(defaults.bonus_floor_gwei),
            bonus_step_gwei: toml.bonus_gas_step_gwei.unwrap_or(defaults.bonus_step_gwei),
            limit_bonus: toml.gas_limit_bonus.unwrap_or(defaults.limit_bonus),
        }
    }
}
