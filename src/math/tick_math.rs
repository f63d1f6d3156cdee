// Float tick math for framing position inputs.
// ----------------------------------------------------------------------------------------
// Price and tick are related by price = 1.0001^tick. Nothing here simulates swaps or
// liquidity; the backtest itself runs on the remote service. These helpers only turn
// "x% below / y% above" into tick offsets.
//
// price_from_tick goes through the sqrt form (sqrtPrice = 1.0001^(tick/2), squared) so it
// follows the protocol's sqrt-price representation. At extreme ticks the sqrt form and the
// closed form 1.0001^tick can differ in the last bits; the resolver only ever uses this
// one convention.

use crate::error::{RangeError, Side};

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// Base of the tick scale.
pub const TICK_BASE: f64 = 1.0001;

/// Price (token1 per token0, raw units) at `tick`.
pub fn price_from_tick(tick: i32) -> f64 {
    let sqrt_price = TICK_BASE.powf(tick as f64 / 2.0);
    sqrt_price * sqrt_price
}

/// Nearest tick for a raw price, by `ln(price) / ln(1.0001)`.
pub fn tick_from_price(price: f64) -> Option<i64> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    Some(log_ticks(price))
}

#[inline]
fn log_ticks(ratio: f64) -> i64 {
    // f64::round is half-away-from-zero
    (ratio.ln() / TICK_BASE.ln()).round() as i64
}

/// Tick offset (zero or negative) for a price `pct` percent below the reference.
///
/// Fails for negative, non-finite, or `pct >= 100` (the price would hit zero).
pub fn tick_offset_below(pct: f64) -> Result<i64, RangeError> {
    if !pct.is_finite() || pct < 0.0 || pct >= 100.0 {
        return Err(RangeError::InvalidPercentage { side: Side::Below, value: pct });
    }
    Ok(log_ticks(1.0 - pct / 100.0))
}

/// Tick offset (zero or positive) for a price `pct` percent above the reference.
pub fn tick_offset_above(pct: f64) -> Result<i64, RangeError> {
    if !pct.is_finite() || pct < 0.0 {
        return Err(RangeError::InvalidPercentage { side: Side::Above, value: pct });
    }
    Ok(log_ticks(1.0 + pct / 100.0))
}
