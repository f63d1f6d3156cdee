// request.rs
// Packs resolved ticks, encoded amounts and a backtest window into the parameter list the
// remote backtest endpoints expect. No math happens here beyond calling into crate::math.

use ethers::types::Address;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::RangeError;
use crate::math::amounts::{BaseUnitAmount, HumanAmount};
use crate::math::tick_range::{PriceOffsetSpec, TickRange, TickRangeResolver, TickSpacing};

pub const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;
/// Approximate Ethereum mainnet block cadence.
pub const BLOCKS_PER_DAY: u64 = 6600;

/// Time/block cadence of the chain being backtested.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChainCadence {
    pub blocks_per_day: u64,
    pub ms_per_day: u64,
}

impl Default for ChainCadence {
    fn default() -> Self {
        Self { blocks_per_day: BLOCKS_PER_DAY, ms_per_day: MS_PER_DAY }
    }
}

/// Which remote endpoint flavour to use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Timestamp,
    Block,
}

/// Span of history to replay. Exactly one mode per request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BacktestWindow {
    Blocks { start_block: u64, end_block: u64 },
    Timestamps { start_ms: u64, end_ms: u64 },
}

impl BacktestWindow {
    pub fn blocks(start_block: u64, end_block: u64) -> Result<Self, RangeError> {
        if start_block > end_block {
            return Err(RangeError::InvalidWindow { start: start_block, end: end_block });
        }
        Ok(BacktestWindow::Blocks { start_block, end_block })
    }

    pub fn timestamps(start_ms: u64, end_ms: u64) -> Result<Self, RangeError> {
        if start_ms > end_ms {
            return Err(RangeError::InvalidWindow { start: start_ms, end: end_ms });
        }
        Ok(BacktestWindow::Timestamps { start_ms, end_ms })
    }

    /// `days` worth of blocks ending at `live_block`, floored at genesis.
    pub fn blocks_back(live_block: u64, days: u64, cadence: &ChainCadence) -> Self {
        let span = days.saturating_mul(cadence.blocks_per_day);
        BacktestWindow::Blocks {
            start_block: live_block.saturating_sub(span),
            end_block: live_block,
        }
    }

    /// `days` worth of milliseconds ending at `now_ms`, floored at the epoch.
    pub fn timestamps_back(now_ms: u64, days: u64, cadence: &ChainCadence) -> Self {
        let span = days.saturating_mul(cadence.ms_per_day);
        BacktestWindow::Timestamps {
            start_ms: now_ms.saturating_sub(span),
            end_ms: now_ms,
        }
    }

    pub fn mode(&self) -> WindowMode {
        match self {
            BacktestWindow::Blocks { .. } => WindowMode::Block,
            BacktestWindow::Timestamps { .. } => WindowMode::Timestamp,
        }
    }

    pub fn start(&self) -> u64 {
        match *self {
            BacktestWindow::Blocks { start_block, .. } => start_block,
            BacktestWindow::Timestamps { start_ms, .. } => start_ms,
        }
    }

    pub fn end(&self) -> u64 {
        match *self {
            BacktestWindow::Blocks { end_block, .. } => end_block,
            BacktestWindow::Timestamps { end_ms, .. } => end_ms,
        }
    }

    /// RPC method serving this window type.
    pub fn method(&self) -> &'static str {
        match self {
            BacktestWindow::Blocks { .. } => "backtestPosition",
            BacktestWindow::Timestamps { .. } => "backtestPositionInTimeRange",
        }
    }
}

/// Range plus both encoded deposits, ready for a request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionParameters {
    pub range: TickRange,
    pub amount0: BaseUnitAmount,
    pub amount1: BaseUnitAmount,
}

/// Resolves the tick range around `reference_tick` for a fee tier and encodes both
/// deposits. Fails only on bad percentages or a range that collapses after alignment.
#[allow(clippy::too_many_arguments)]
pub fn resolve_position_parameters(
    resolver: &TickRangeResolver,
    reference_tick: i32,
    fee_tier: u32,
    below: PriceOffsetSpec,
    above: PriceOffsetSpec,
    amount0: impl Into<HumanAmount>,
    decimals0: u32,
    amount1: impl Into<HumanAmount>,
    decimals1: u32,
) -> Result<PositionParameters, RangeError> {
    let spacing = TickSpacing::from_fee(fee_tier);
    let range = resolver.resolve(reference_tick, spacing, below, above)?;

    Ok(PositionParameters {
        range,
        amount0: amount0.into().encode(decimals0),
        amount1: amount1.into().encode(decimals1),
    })
}

/// Fully packaged backtest call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BacktestRequest {
    pub pool: Address,
    pub range: TickRange,
    pub amount0: BaseUnitAmount,
    pub amount1: BaseUnitAmount,
    pub window: BacktestWindow,
}

impl BacktestRequest {
    pub fn method(&self) -> &'static str {
        self.window.method()
    }

    /// Positional params: pool, lower, upper, amount0, amount1, start, end.
    pub fn params(&self) -> Value {
        json!([
            self.pool,
            self.range.lower,
            self.range.upper,
            self.amount0.to_hex(),
            self.amount1.to_hex(),
            self.window.start(),
            self.window.end(),
        ])
    }
}

/// Pairs a resolved position with exactly one window. Each finishing method picks the
/// window mode, so a request can never carry both.
#[derive(Clone, Debug)]
pub struct BacktestRequestBuilder {
    pool: Address,
    position: PositionParameters,
}

impl BacktestRequestBuilder {
    pub fn new(pool: Address, position: PositionParameters) -> Self {
        Self { pool, position }
    }

    pub fn window(self, window: BacktestWindow) -> BacktestRequest {
        BacktestRequest {
            pool: self.pool,
            range: self.position.range,
            amount0: self.position.amount0,
            amount1: self.position.amount1,
            window,
        }
    }

    pub fn time_range(self, start_ms: u64, end_ms: u64) -> Result<BacktestRequest, RangeError> {
        Ok(self.window(BacktestWindow::timestamps(start_ms, end_ms)?))
    }

    pub fn block_range(self, start_block: u64, end_block: u64) -> Result<BacktestRequest, RangeError> {
        Ok(self.window(BacktestWindow::blocks(start_block, end_block)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::amounts::encode;
    use std::str::FromStr;

    fn pool() -> Address {
        Address::from_str("0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640").unwrap()
    }

    #[test]
    fn parameters_for_ten_percent_band() {
        let params = resolve_position_parameters(
            &TickRangeResolver::default(),
            0,
            3000,
            PriceOffsetSpec::Percentage(10.0),
            PriceOffsetSpec::Percentage(10.0),
            1.5,
            6,
            0.0,
            18,
        )
        .unwrap();

        assert_eq!(params.range, TickRange { lower: -1080, upper: 960 });
        assert_eq!(params.amount0.to_hex(), "0x16e360");
        assert_eq!(params.amount1.to_hex(), "0x0");
    }

    #[test]
    fn percentage_errors_propagate_unchanged() {
        let err = resolve_position_parameters(
            &TickRangeResolver::default(),
            0,
            500,
            PriceOffsetSpec::Percentage(100.0),
            PriceOffsetSpec::Unbounded,
            1.0,
            18,
            1.0,
            6,
        )
        .unwrap_err();
        assert!(matches!(err, RangeError::InvalidPercentage { .. }));
    }

    #[test]
    fn windows_reject_reversed_bounds() {
        assert_eq!(
            BacktestWindow::blocks(10, 5),
            Err(RangeError::InvalidWindow { start: 10, end: 5 })
        );
        assert!(BacktestWindow::timestamps(7, 7).is_ok());
    }

    #[test]
    fn lookback_windows_saturate() {
        let cadence = ChainCadence::default();
        assert_eq!(
            BacktestWindow::blocks_back(20_000_000, 7, &cadence),
            BacktestWindow::Blocks { start_block: 19_953_800, end_block: 20_000_000 }
        );
        assert_eq!(
            BacktestWindow::blocks_back(1_000, 30, &cadence),
            BacktestWindow::Blocks { start_block: 0, end_block: 1_000 }
        );
        assert_eq!(
            BacktestWindow::timestamps_back(1_700_000_000_000, 1, &cadence),
            BacktestWindow::Timestamps { start_ms: 1_699_913_600_000, end_ms: 1_700_000_000_000 }
        );
    }

    #[test]
    fn builder_packs_time_range_request() {
        let position = PositionParameters {
            range: TickRange { lower: -1080, upper: 960 },
            amount0: encode(1.5, 6),
            amount1: encode(1.0, 18),
        };

        let request = BacktestRequestBuilder::new(pool(), position.clone())
            .time_range(100, 200)
            .unwrap();

        assert_eq!(request.method(), "backtestPositionInTimeRange");
        assert_eq!(
            request.params(),
            json!([
                "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640",
                -1080,
                960,
                "0x16e360",
                "0xde0b6b3a7640000",
                100,
                200
            ])
        );

        assert_eq!(
            BacktestRequestBuilder::new(pool(), position).block_range(300, 200),
            Err(RangeError::InvalidWindow { start: 300, end: 200 })
        );
    }

    #[test]
    fn block_window_selects_legacy_endpoint() {
        let window = BacktestWindow::Blocks { start_block: 1, end_block: 2 };
        assert_eq!(window.method(), "backtestPosition");
        assert_eq!(window.mode(), WindowMode::Block);
    }

    #[test]
    fn window_serializes_with_mode_tag() {
        let window = BacktestWindow::Timestamps { start_ms: 1, end_ms: 2 };
        assert_eq!(
            serde_json::to_value(window).unwrap(),
            json!({ "mode": "timestamps", "start_ms": 1, "end_ms": 2 })
        );
    }
}
