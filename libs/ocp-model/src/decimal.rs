//! Decimal helpers (spec.md §9 "Decimal arithmetic", invariants I7/P5).
//!
//! Cost columns are `rust_decimal::Decimal` end to end; `f64` is only ever
//! used for ratio/seconds-to-hours math, and results are quantised back to
//! `Decimal` here before they reach an output row.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Quantise an `f64` ratio/seconds computation into a `Decimal` with `scale`
/// digits after the point. Non-finite inputs (NaN, +/-inf) round to zero,
/// matching the "negative or non-finite inputs: treat as zero" edge case
/// spec.md §4.4 states for capacity math and which this crate applies
/// uniformly to any f64-to-Decimal boundary.
pub fn quantize(value: f64, scale: u32) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(scale)
}

/// `markup_X = base_X * markup_rate`, bit-exact Decimal multiplication per
/// spec.md I7/P5.
pub fn markup(base: Decimal, markup_rate: Decimal) -> Decimal {
    base * markup_rate
}
