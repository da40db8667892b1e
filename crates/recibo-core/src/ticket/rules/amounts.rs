//! Decimal parsing and rounding for ticket amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a Spanish-formatted amount: comma is the decimal separator, any
/// period is a thousands separator and is stripped before conversion.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    let normalized = cleaned.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

/// Round to two decimals, half away from zero. Used for every money amount.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to three decimals. Used for quantities and normalized weights.
pub fn round3(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}
