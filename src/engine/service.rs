use std::str::FromStr;

use ethers::types::Address;

use crate::chain::oku_client::{OkuApi, PoolSummary, PositionStatistics, TopPoolsQuery};
use crate::engine::request::{
    resolve_position_parameters, BacktestRequest, BacktestRequestBuilder, BacktestWindow,
    ChainCadence, WindowMode,
};
use crate::error::{OkuError, RangeError, ServiceError};
use crate::math::amounts::HumanAmount;
use crate::math::tick_range::{PriceOffsetSpec, TickRange, TickRangeResolver, TickSpacing};

/// Pool listing filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolFilter {
    pub limit: usize,
    pub min_tvl_usd: f64,
}

/// Keeps pools at or above the TVL floor that actually earned fees, in service order.
pub fn filter_pools(pools: Vec<PoolSummary>, filter: &PoolFilter) -> Vec<PoolSummary> {
    pools
        .into_iter()
        .filter(|pool| pool.tvl_usd >= filter.min_tvl_usd)
        .filter(|pool| pool.estimated_apr().map_or(false, |apr| apr > 0.0))
        .take(filter.limit)
        .collect()
}

pub async fn list_pools<A>(api: &A, filter: &PoolFilter) -> Result<Vec<PoolSummary>, OkuError>
where
    A: OkuApi + Sync,
{
    let pools = api.top_pools(&TopPoolsQuery::default()).await?;
    let total = pools.len();
    let kept = filter_pools(pools, filter);
    log::info!(
        "Pool listing: {} of {} pools kept (min TVL ${:.0}, limit {})",
        kept.len(),
        total,
        filter.min_tvl_usd,
        filter.limit
    );
    Ok(kept)
}

/// Everything a caller supplies for one backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestPlan {
    pub pool_address: String,
    pub below: PriceOffsetSpec,
    pub above: PriceOffsetSpec,
    pub amount0: HumanAmount,
    pub amount1: HumanAmount,
    pub days_back: u64,
    pub mode: WindowMode,
}

/// Static inputs shared by every backtest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestSettings {
    pub resolver: TickRangeResolver,
    pub cadence: ChainCadence,
}

/// Request plus the context it was derived from, before submission.
#[derive(Debug, Clone)]
pub struct PreparedBacktest {
    pub pool: PoolSummary,
    pub spacing: TickSpacing,
    pub current_tick: i32,
    /// Range around the current tick, for display. `None` when it does not resolve there.
    pub current_range: Option<TickRange>,
    /// Tick at the window start; only fetched for timestamp windows.
    pub entry_tick: Option<i32>,
    pub request: BacktestRequest,
}

#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub prepared: PreparedBacktest,
    pub statistics: PositionStatistics,
}

pub fn parse_pool_address(input: &str) -> Result<Address, ServiceError> {
    Address::from_str(input.trim()).map_err(|_| ServiceError::InvalidAddress(input.to_string()))
}

/// Validates a typed-in deposit. Blank input means no deposit on that side.
pub fn parse_amount(input: &str) -> Result<HumanAmount, ServiceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(HumanAmount::default());
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(HumanAmount::Text(trimmed.to_string())),
        _ => Err(ServiceError::InvalidAmount(input.to_string())),
    }
}

/// Wall clock in epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Fetches pool state, resolves ticks and encodes deposits. Nothing is submitted.
///
/// Timestamp windows resolve the submitted range against the tick at the window start, so
/// the position reflects the market at entry. Block windows use the current tick.
pub async fn prepare_backtest<A>(
    api: &A,
    settings: &BacktestSettings,
    plan: &BacktestPlan,
    now_ms: u64,
) -> Result<PreparedBacktest, ServiceError>
where
    A: OkuApi + Sync,
{
    let pool_address = parse_pool_address(&plan.pool_address)?;
    let address_param = format!("{:?}", pool_address);

    let (pool, current_tick) = tokio::try_join!(
        api.pool_details(&address_param),
        api.last_pool_tick(&address_param),
    )?;

    prepare_backtest_for_pool(api, settings, plan, pool, current_tick, now_ms).await
}

/// Same as [`prepare_backtest`] for a caller that already holds the pool summary and
/// current tick. Only the window-dependent calls are made.
pub async fn prepare_backtest_for_pool<A>(
    api: &A,
    settings: &BacktestSettings,
    plan: &BacktestPlan,
    pool: PoolSummary,
    current_tick: i32,
    now_ms: u64,
) -> Result<PreparedBacktest, ServiceError>
where
    A: OkuApi + Sync,
{
    let pool_address = parse_pool_address(&plan.pool_address)?;
    let address_param = format!("{:?}", pool_address);

    let spacing = TickSpacing::from_fee(pool.fee);
    log::info!(
        "Pool {} ({}): fee {}, spacing {}, current tick {}",
        address_param,
        pool.pair_name(),
        pool.fee,
        spacing,
        current_tick
    );

    // Display only; the submitted range is resolved separately below. Bad percentages
    // fail here, an empty range at this tick does not.
    let current_range = match settings.resolver.resolve(current_tick, spacing, plan.below, plan.above) {
        Ok(range) => {
            log::info!("Range at current tick: {}", range);
            Some(range)
        }
        Err(e @ RangeError::InvalidTickRange { .. }) => {
            log::warn!("No range at current tick {}: {}", current_tick, e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let (window, entry_tick) = match plan.mode {
        WindowMode::Timestamp => {
            let window = BacktestWindow::timestamps_back(now_ms, plan.days_back, &settings.cadence);
            let entry_tick = api.tick_at_timestamp(&address_param, window.start()).await?;
            log::info!("Tick at window start {}: {}", window.start(), entry_tick);
            (window, Some(entry_tick))
        }
        WindowMode::Block => {
            let live_block = api.live_block().await?;
            let window = BacktestWindow::blocks_back(live_block, plan.days_back, &settings.cadence);
            log::info!("Block window {}..{}", window.start(), window.end());
            (window, None)
        }
    };

    let position = resolve_position_parameters(
        &settings.resolver,
        entry_tick.unwrap_or(current_tick),
        pool.fee,
        plan.below,
        plan.above,
        plan.amount0.clone(),
        pool.t0_decimals,
        plan.amount1.clone(),
        pool.t1_decimals,
    )?;
    log::info!(
        "Submitted range {}, deposits {} / {}",
        position.range,
        position.amount0,
        position.amount1
    );

    let request = BacktestRequestBuilder::new(pool_address, position).window(window);

    Ok(PreparedBacktest {
        pool,
        spacing,
        current_tick,
        current_range,
        entry_tick,
        request,
    })
}

pub async fn submit_backtest<A>(api: &A, prepared: PreparedBacktest) -> Result<BacktestOutcome, ServiceError>
where
    A: OkuApi + Sync,
{
    let statistics = api.backtest(&prepared.request).await?;
    Ok(BacktestOutcome { prepared, statistics })
}

/// Prepare and submit in one go.
pub async fn run_backtest<A>(
    api: &A,
    settings: &BacktestSettings,
    plan: &BacktestPlan,
    now_ms: u64,
) -> Result<BacktestOutcome, ServiceError>
where
    A: OkuApi + Sync,
{
    let prepared = prepare_backtest(api, settings, plan, now_ms).await?;
    submit_backtest(api, prepared).await
}
