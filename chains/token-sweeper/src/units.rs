//! Conversions between on-chain integers and the strings shown in reports.

use core_logic::{format_ether, WEI_PER_ETHER};
use ethers::types::U256;
use ethers::utils::format_units;

/// `amount` scaled down by `10^decimals`, with trailing zeros trimmed
/// (`150_00000000` at 8 decimals is `"150"`).
pub fn format_token_amount(amount: U256, decimals: u32) -> String {
    match format_units(amount, decimals) {
        Ok(text) if text.contains('.') => {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.');
            trimmed.to_string()
        }
        Ok(text) => text,
        Err(_) => amount.to_string(),
    }
}

/// `min * 10^decimals`, the smallest balance a sweep acts on.
pub fn token_threshold(min: U256, decimals: u32) -> U256 {
    min.saturating_mul(U256::exp10(decimals as usize))
}

fn saturating_u128(wei: U256) -> u128 {
    if wei > U256::from(u128::MAX) {
        u128::MAX
    } else {
        wei.as_u128()
    }
}

/// Wei as ether, truncated to `decimals` places.
pub fn format_wei(wei: U256, decimals: usize) -> String {
    format_ether(saturating_u128(wei), decimals)
}

pub fn wei_to_eth(wei: U256) -> f64 {
    saturating_u128(wei) as f64 / WEI_PER_ETHER as f64
}

/// USD value of `wei` at `eth_usd`, or `n/a` without a quote.
pub fn format_usd(wei: U256, eth_usd: Option<f64>) -> String {
    match eth_usd {
        Some(price) => format!("{:.2}", wei_to_eth(wei) * price),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_token_amount_trims() {
        assert_eq!(format_token_amount(U256::from(150u64) * U256::exp10(8), 8), "150");
        assert_eq!(format_token_amount(U256::from(12_345_000_000u64), 8), "123.45");
        assert_eq!(format_token_amount(U256::from(1u64), 8), "0.00000001");
        assert_eq!(format_token_amount(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_threshold() {
        assert_eq!(
            token_threshold(U256::from(100u64), 8),
            U256::from(10_000_000_000u64)
        );
    }

    #[test]
    fn test_format_wei_and_usd() {
        let fee = U256::from(1_639_488_000_000_000u64);
        assert_eq!(format_wei(fee, 6), "0.001639");
        assert_eq!(format_usd(fee, None), "n/a");
        assert_eq!(format_usd(U256::exp10(18), Some(3000.0)), "3000.00");
    }
}
