//! Unit Conversion Utilities
//!
//! Helpers for ether/wei conversions and formatting.

use alloy_primitives::U256;

/// Decimals of the native currency
pub const ETHER_DECIMALS: usize = 18;

/// Wei per ether
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Parse a decimal ether amount ("0.001") into wei.
///
/// Rejects more than 18 fractional digits instead of rounding.
pub fn parse_ether(s: &str) -> Option<U256> {
    let s = s.trim().replace('_', "");
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > ETHER_DECIMALS {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).ok()?
    };
    let padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS);
    let frac = U256::from_str_radix(&padded, 10).ok()?;

    whole
        .checked_mul(U256::from(WEI_PER_ETHER))?
        .checked_add(frac)
}

/// Format wei as a decimal ether string without trailing zeros
pub fn format_ether(wei: U256) -> String {
    let unit = U256::from(WEI_PER_ETHER);
    let whole = wei / unit;
    let frac = wei % unit;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac = format!("{:0>width$}", frac.to_string(), width = ETHER_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Convert wei to human-readable string
/// e.g., 1000000000000000 -> "0.001 ETH (1000000000000000 wei)"
pub fn wei_to_display(wei: U256) -> String {
    format!("{} ETH ({} wei)", format_ether(wei), wei)
}
