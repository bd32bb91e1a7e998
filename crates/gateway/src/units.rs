//! Unit conversion between wei and ether, and JSON-RPC hex quantities

use crate::error::{GatewayError, GatewayResult};
use crate::types::U256;

/// Decimal places between wei and ether
pub const ETHER_DECIMALS: usize = 18;

pub const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

pub const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Format a wei amount as a decimal ether string without trailing zeros.
pub fn format_ether(wei: U256) -> String {
    let factor = U256::from(WEI_PER_ETHER);
    let whole = wei / factor;
    let frac = wei % factor;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac = format!("{:0>width$}", frac.to_string(), width = ETHER_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Ether amount as a JSON number: an integer when whole, otherwise the
/// nearest `f64`.
pub fn ether_number(wei: U256) -> Option<serde_json::Number> {
    let factor = U256::from(WEI_PER_ETHER);
    let whole = wei / factor;
    if (wei % factor).is_zero() && whole <= U256::from(u64::MAX) {
        return Some(serde_json::Number::from(whole.low_u64()));
    }

    format_ether(wei)
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
}

/// Parse a decimal ether string ("1", "0.25", "12.") into wei.
pub fn parse_ether(value: &str) -> GatewayResult<U256> {
    let invalid = || GatewayError::Validation(format!("invalid ether amount: {}", value));

    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (value, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(GatewayError::Validation(format!(
            "ether amount has more than {} decimals: {}",
            ETHER_DECIMALS, value
        )));
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| invalid())?
    };
    let frac = if frac.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS);
        U256::from_dec_str(&padded).map_err(|_| invalid())?
    };

    whole
        .checked_mul(U256::from(WEI_PER_ETHER))
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)
}

/// Parse a hex quantity ("0x1bc16d674ec80000") as returned by JSON-RPC.
pub fn parse_quantity(value: &str) -> Result<U256, String> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|_| format!("invalid hex quantity: {}", value))
}

pub fn parse_u64_quantity(value: &str) -> Result<u64, String> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|_| format!("invalid hex quantity: {}", value))
}
