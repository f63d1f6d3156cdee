// tests/backtest_workflow.rs
// ===================================
// End-to-end backtest workflow against an in-memory Oku service: both window modes,
// entry-tick resolution, pool filtering and error propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use oku_backtester::chain::oku_client::{
    OkuApi, PoolSummary, PositionStatistics, TopPoolsQuery,
};
use oku_backtester::engine::report::{render_summary, DerivedMetrics};
use oku_backtester::engine::request::{BacktestRequest, BacktestWindow, WindowMode};
use oku_backtester::engine::service::{
    list_pools, prepare_backtest, prepare_backtest_for_pool, run_backtest, BacktestPlan,
    BacktestSettings, PoolFilter,
};
use oku_backtester::error::{OkuError, RangeError, ServiceError};
use oku_backtester::math::amounts::HumanAmount;
use oku_backtester::math::tick_range::{PriceOffsetSpec, TickRange};

const POOL: &str = "0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640";
const NOW_MS: u64 = 1_700_000_000_000;

struct FakeOku {
    pool: PoolSummary,
    listing: Vec<PoolSummary>,
    current_tick: i32,
    entry_tick: i32,
    live_block: u64,
    fail_entry_tick: bool,
    pool_fetches: AtomicUsize,
    tick_lookups: Mutex<Vec<u64>>,
    submitted: Mutex<Vec<BacktestRequest>>,
}

impl FakeOku {
    fn new() -> Self {
        Self {
            pool: pool_summary(POOL, 3000, 250_000_000.0, 90_000.0),
            listing: Vec::new(),
            current_tick: 200_000,
            entry_tick: 195_000,
            live_block: 20_000_000,
            fail_entry_tick: false,
            pool_fetches: AtomicUsize::new(0),
            tick_lookups: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn submitted(&self) -> Vec<BacktestRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

fn pool_summary(address: &str, fee: u32, tvl_usd: f64, total_fees_usd: f64) -> PoolSummary {
    PoolSummary {
        address: address.to_string(),
        t0_name: "USDC".to_string(),
        t1_name: "WETH".to_string(),
        tvl_usd,
        total_fees_usd,
        fee,
        apr: None,
        t0_decimals: 6,
        t1_decimals: 18,
    }
}

impl OkuApi for FakeOku {
    async fn live_block(&self) -> Result<u64, OkuError> {
        Ok(self.live_block)
    }

    async fn top_pools(&self, _query: &TopPoolsQuery) -> Result<Vec<PoolSummary>, OkuError> {
        Ok(self.listing.clone())
    }

    async fn pool_details(&self, pool_address: &str) -> Result<PoolSummary, OkuError> {
        self.pool_fetches.fetch_add(1, Ordering::SeqCst);
        if pool_address.eq_ignore_ascii_case(&self.pool.address) {
            Ok(self.pool.clone())
        } else {
            Err(OkuError::PoolNotFound(pool_address.to_string()))
        }
    }

    async fn last_pool_tick(&self, _pool_address: &str) -> Result<i32, OkuError> {
        self.pool_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_tick)
    }

    async fn tick_at_timestamp(&self, _pool_address: &str, timestamp_ms: u64) -> Result<i32, OkuError> {
        self.tick_lookups.lock().unwrap().push(timestamp_ms);
        if self.fail_entry_tick {
            return Err(OkuError::Rpc {
                method: "poolTickStateAtTimestamp".to_string(),
                code: -32000,
                message: "no state before pool creation".to_string(),
            });
        }
        Ok(self.entry_tick)
    }

    async fn backtest(&self, request: &BacktestRequest) -> Result<PositionStatistics, OkuError> {
        self.submitted.lock().unwrap().push(request.clone());
        Ok(PositionStatistics {
            value_initial_quoted0: 2_000.0,
            value_now_quoted0: 2_060.0,
            value_if_held_quoted0: 2_040.0,
            fees_quoted0: 50.0,
            impermanent_loss_quoted0: 30.0,
            net_profit_quoted0: 60.0,
            return_proportion_quoted0: 0.03,
            ..Default::default()
        })
    }
}

fn plan(mode: WindowMode) -> BacktestPlan {
    BacktestPlan {
        pool_address: POOL.to_string(),
        below: PriceOffsetSpec::Percentage(10.0),
        above: PriceOffsetSpec::Percentage(10.0),
        amount0: HumanAmount::from("1000"),
        amount1: HumanAmount::from(0.5),
        days_back: 7,
        mode,
    }
}

#[tokio::test]
async fn test_timestamp_backtest_resolves_range_at_entry_tick() {
    let api = FakeOku::new();
    let outcome = run_backtest(&api, &BacktestSettings::default(), &plan(WindowMode::Timestamp), NOW_MS)
        .await
        .expect("backtest should run");

    let prepared = &outcome.prepared;
    assert_eq!(prepared.current_tick, 200_000);
    assert_eq!(prepared.entry_tick, Some(195_000));
    assert_eq!(prepared.current_range, Some(TickRange { lower: 198_900, upper: 201_000 }));
    assert_eq!(prepared.request.range, TickRange { lower: 193_920, upper: 195_960 });

    let window_start = NOW_MS - 7 * 86_400_000;
    assert_eq!(*api.tick_lookups.lock().unwrap(), vec![window_start]);
    assert_eq!(
        prepared.request.window,
        BacktestWindow::Timestamps { start_ms: window_start, end_ms: NOW_MS }
    );

    let submitted = api.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].method(), "backtestPositionInTimeRange");
    assert_eq!(
        submitted[0].params(),
        serde_json::json!([
            "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640",
            193_920,
            195_960,
            "0x3b9aca00",
            "0x6f05b59d3b20000",
            window_start,
            NOW_MS
        ])
    );

    let metrics = DerivedMetrics::from_statistics(&outcome.statistics);
    assert!((metrics.quoted0.return_pct - 3.0).abs() < 1e-9);
    assert!(render_summary(&outcome.statistics, "USDC", "WETH").contains("Net Profit:         60.0000 USDC (+3.00%)"));
}

#[tokio::test]
async fn test_block_backtest_uses_current_tick_and_legacy_endpoint() {
    let api = FakeOku::new();
    let outcome = run_backtest(&api, &BacktestSettings::default(), &plan(WindowMode::Block), NOW_MS)
        .await
        .expect("backtest should run");

    assert_eq!(outcome.prepared.entry_tick, None);
    assert!(api.tick_lookups.lock().unwrap().is_empty());
    assert_eq!(Some(outcome.prepared.request.range), outcome.prepared.current_range);
    assert_eq!(
        outcome.prepared.request.window,
        BacktestWindow::Blocks { start_block: 19_953_800, end_block: 20_000_000 }
    );
    assert_eq!(api.submitted()[0].method(), "backtestPosition");
}

#[tokio::test]
async fn test_unbounded_sides_reach_usable_extremes() {
    let api = FakeOku::new();
    let mut unbounded = plan(WindowMode::Timestamp);
    unbounded.below = PriceOffsetSpec::Unbounded;
    unbounded.above = PriceOffsetSpec::Unbounded;

    let prepared = prepare_backtest(&api, &BacktestSettings::default(), &unbounded, NOW_MS)
        .await
        .unwrap();
    assert_eq!(prepared.request.range, TickRange { lower: -887_220, upper: 887_220 });
    assert!(api.submitted().is_empty(), "prepare must not submit");
}

#[tokio::test]
async fn test_known_pool_state_is_not_fetched_again() {
    let api = FakeOku::new();
    let pool = api.pool.clone();

    let prepared = prepare_backtest_for_pool(
        &api,
        &BacktestSettings::default(),
        &plan(WindowMode::Timestamp),
        pool,
        200_000,
        NOW_MS,
    )
    .await
    .unwrap();

    assert_eq!(api.pool_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(api.tick_lookups.lock().unwrap().len(), 1);
    assert_eq!(prepared.request.range, TickRange { lower: 193_920, upper: 195_960 });
}

#[tokio::test]
async fn test_empty_range_at_current_tick_does_not_block_entry_range() {
    let mut api = FakeOku::new();
    // Aligned to 60, so a 0%/0% band collapses here but not at the off-grid entry tick
    api.current_tick = 200_040;
    api.entry_tick = 195_001;

    let mut narrow = plan(WindowMode::Timestamp);
    narrow.below = PriceOffsetSpec::Percentage(0.0);
    narrow.above = PriceOffsetSpec::Percentage(0.0);

    let prepared = prepare_backtest(&api, &BacktestSettings::default(), &narrow, NOW_MS)
        .await
        .expect("entry range is valid");
    assert_eq!(prepared.current_range, None);
    assert_eq!(prepared.request.range, TickRange { lower: 195_000, upper: 195_060 });

    // Block windows submit the current-tick range, so the same input is rejected
    let mut block = narrow.clone();
    block.mode = WindowMode::Block;
    let err = prepare_backtest(&api, &BacktestSettings::default(), &block, NOW_MS)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Range(RangeError::InvalidTickRange { .. })));
}

#[tokio::test]
async fn test_invalid_percentage_stops_before_submission() {
    let api = FakeOku::new();
    let mut bad = plan(WindowMode::Timestamp);
    bad.below = PriceOffsetSpec::Percentage(100.0);

    let err = run_backtest(&api, &BacktestSettings::default(), &bad, NOW_MS)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Range(RangeError::InvalidPercentage { .. })));
    assert!(err.is_client_error());
    assert!(api.tick_lookups.lock().unwrap().is_empty());
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_remote_failures_propagate_unchanged() {
    let mut api = FakeOku::new();
    api.fail_entry_tick = true;

    let err = run_backtest(&api, &BacktestSettings::default(), &plan(WindowMode::Timestamp), NOW_MS)
        .await
        .unwrap_err();
    match err {
        ServiceError::Oku(OkuError::Rpc { code, .. }) => assert_eq!(code, -32000),
        other => panic!("unexpected error: {other}"),
    }
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_unknown_pool_and_bad_address() {
    let api = FakeOku::new();

    let mut unknown = plan(WindowMode::Block);
    unknown.pool_address = "0x0000000000000000000000000000000000000001".to_string();
    let err = run_backtest(&api, &BacktestSettings::default(), &unknown, NOW_MS)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Oku(OkuError::PoolNotFound(_))));
    assert!(!err.is_client_error());

    let mut malformed = plan(WindowMode::Block);
    malformed.pool_address = "uniswap".to_string();
    let err = run_backtest(&api, &BacktestSettings::default(), &malformed, NOW_MS)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidAddress(_)));
}

#[test]
fn test_pool_listing_filters_and_truncates() {
    let mut api = FakeOku::new();
    api.listing = vec![
        pool_summary("0xa", 500, 300_000_000.0, 120_000.0),
        pool_summary("0xb", 3000, 900_000.0, 400.0),
        pool_summary("0xc", 10000, 5_000_000.0, 0.0),
        pool_summary("0xd", 3000, 80_000_000.0, 20_000.0),
        pool_summary("0xe", 100, 2_000_000.0, 10.0),
    ];

    let filter = PoolFilter { limit: 2, min_tvl_usd: 1_000_000.0 };
    let pools = tokio_test::block_on(list_pools(&api, &filter)).unwrap();

    let addresses: Vec<&str> = pools.iter().map(|pool| pool.address.as_str()).collect();
    assert_eq!(addresses, vec!["0xa", "0xd"]);
    for pool in &pools {
        println!("{}: APR {:.2}%", pool.pair_name(), pool.estimated_apr().unwrap_or_default());
    }
}
