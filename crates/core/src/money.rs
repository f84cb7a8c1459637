//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` and are accumulated at full precision.
//! Rounding to cents happens only where a figure leaves the system.

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount (shop currency, unscaled).
pub type Money = Decimal;

/// Round an amount to 2 decimal places for presentation (half away from zero).
pub fn present(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert to `f64` for gauges and other lossy sinks.
pub fn to_f64(amount: Money) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    amount.to_f64().unwrap_or(0.0)
}
