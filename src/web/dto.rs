use rocket::serde::{Deserialize, Serialize};

use crate::chain::oku_client::{PoolSummary, PositionStatistics};
use crate::engine::report::DerivedMetrics;
use crate::engine::request::{BacktestWindow, WindowMode};
use crate::engine::service::{BacktestOutcome, BacktestPlan};
use crate::math::amounts::HumanAmount;
use crate::math::tick_range::PriceOffsetSpec;

#[derive(Deserialize, rocket::FromForm)]
pub struct PoolsQuery {
    pub num: Option<usize>,
    pub min_tvl: Option<f64>,
}

#[derive(Serialize)]
pub struct PoolsResponse {
    pub pools: Vec<PoolSummary>,
}

/// Body of `POST /api/v1/backtest`. Percentages take a number or "infinite"/"unbounded";
/// amounts take a number or a numeric string.
#[derive(Debug, Deserialize)]
pub struct BacktestBody {
    pub pool_address: String,
    pub pct_below: PriceOffsetSpec,
    pub pct_above: PriceOffsetSpec,
    #[serde(default)]
    pub token0_amount: HumanAmount,
    #[serde(default)]
    pub token1_amount: HumanAmount,
    pub days_back: u64,
    #[serde(default)]
    pub mode: WindowMode,
}

impl From<BacktestBody> for BacktestPlan {
    fn from(body: BacktestBody) -> Self {
        BacktestPlan {
            pool_address: body.pool_address,
            below: body.pct_below,
            above: body.pct_above,
            amount0: body.token0_amount,
            amount1: body.token1_amount,
            days_back: body.days_back,
            mode: body.mode,
        }
    }
}

#[derive(Serialize)]
pub struct BacktestResponse {
    pub pool: PoolSummary,
    pub method: &'static str,
    pub current_tick: i32,
    pub entry_tick: Option<i32>,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub token0_amount_raw: String,
    pub token1_amount_raw: String,
    pub window: BacktestWindow,
    pub statistics: PositionStatistics,
    pub metrics: DerivedMetrics,
}

impl From<BacktestOutcome> for BacktestResponse {
    fn from(outcome: BacktestOutcome) -> Self {
        let metrics = DerivedMetrics::from_statistics(&outcome.statistics);
        let request = outcome.prepared.request;
        BacktestResponse {
            pool: outcome.prepared.pool,
            method: request.method(),
            current_tick: outcome.prepared.current_tick,
            entry_tick: outcome.prepared.entry_tick,
            tick_lower: request.range.lower,
            tick_upper: request.range.upper,
            token0_amount_raw: request.amount0.to_hex(),
            token1_amount_raw: request.amount1.to_hex(),
            window: request.window,
            statistics: outcome.statistics,
            metrics,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
