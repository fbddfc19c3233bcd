//! Token amounts.
//!
//! Amounts are counted in the smallest indivisible unit. One whole VOTE
//! is `10^18` units, the same scaling the funding token uses.

use crate::error::TypesError;

/// Non-negative token quantity in the smallest unit.
pub type Amount = u128;

/// Number of decimal places in a whole token.
pub const DECIMALS: u32 = 18;

/// One whole token (10^18 units).
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Parse a decimal string of whole tokens ("10", "0.5") into units.
pub fn parse_units(s: &str) -> Result<Amount, TypesError> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };

    let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_ok(whole) || !digits_ok(frac) {
        return Err(TypesError::InvalidAmount(s.to_string()));
    }
    if frac.len() > DECIMALS as usize {
        return Err(TypesError::InvalidAmount(format!(
            "{s}: more than {DECIMALS} decimal places"
        )));
    }

    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| TypesError::AmountOverflow)?
    };
    let frac_units: Amount = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS as usize);
        padded.parse().map_err(|_| TypesError::AmountOverflow)?
    };

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(TypesError::AmountOverflow)
}

/// Render units as a decimal string of whole tokens, trimming trailing zeros.
pub fn format_units(amount: Amount) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
