// Interactive console: list pools, pick one, describe a position and print the backtest.
//
//   cargo run --bin backtest_cli                      # timestamp window
//   cargo run --bin backtest_cli -- --mode block       # legacy block window
//   cargo run --bin backtest_cli -- -p 0x... -d 30     # skip the listing and days prompt

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use oku_backtester::bootstrap::AppState;
use oku_backtester::chain::oku_client::OkuApi;
use oku_backtester::config::Config;
use oku_backtester::engine::report::render_summary;
use oku_backtester::engine::request::WindowMode;
use oku_backtester::engine::service::{
    list_pools, now_millis, parse_amount, prepare_backtest_for_pool, submit_backtest,
    BacktestPlan, PoolFilter,
};
use oku_backtester::error::{RangeError, ServiceError, Side};
use oku_backtester::math::amounts::HumanAmount;
use oku_backtester::math::tick_range::{PriceOffsetSpec, TickSpacing};

#[derive(Parser, Debug)]
#[command(name = "backtest_cli")]
#[command(about = "Backtest a Uniswap v3 position through the Oku API")]
struct Args {
    /// Backtest window type
    #[arg(short, long, value_enum, default_value_t = ModeArg::Timestamp)]
    mode: ModeArg,

    /// Pool address; skips the pool listing when given
    #[arg(short, long)]
    pool: Option<String>,

    /// Days of history to replay; skips the prompt when given
    #[arg(short, long)]
    days_back: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Timestamp,
    Block,
}

impl From<ModeArg> for WindowMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Timestamp => WindowMode::Timestamp,
            ModeArg::Block => WindowMode::Block,
        }
    }
}

struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self { lines: BufReader::new(io::stdin()).lines() }
    }

    async fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("stdin closed"),
        }
    }

    async fn ask_offset(&mut self, side: Side) -> Result<PriceOffsetSpec> {
        let question = format!(
            "Enter percentage {} current tick for liquidity (e.g., 5,10,15,20,50 or 'infinite'): ",
            side
        );
        loop {
            let input = self.ask(&question).await?;
            match PriceOffsetSpec::parse(side, &input) {
                Ok(spec) => return Ok(spec),
                Err(e) => println!("{}", e),
            }
        }
    }

    async fn ask_amount(&mut self, token: &str) -> Result<HumanAmount> {
        loop {
            let input = self
                .ask(&format!("Enter deposit amount for {} (human-readable): ", token))
                .await?;
            match parse_amount(&input) {
                Ok(amount) => return Ok(amount),
                Err(e) => println!("{}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let mode = WindowMode::from(args.mode);
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    let state = AppState::new(&config).map_err(|e| anyhow::anyhow!("{}", e))?;
    let api = &state.oku;
    let mut prompt = Prompter::new();

    println!("Fetching latest live block...");
    println!("Live block: {}", api.live_block().await?);

    let pool_address = match args.pool {
        Some(address) => address,
        None => match choose_pool(api, &state, &mut prompt).await? {
            Some(address) => address,
            None => return Ok(()),
        },
    };

    let (details, current_tick) =
        tokio::try_join!(api.pool_details(&pool_address), api.last_pool_tick(&pool_address))?;
    println!("Pool Detailed Info:");
    println!("Token0: {} (Decimals: {})", details.t0_name, details.t0_decimals);
    println!("Token1: {} (Decimals: {})", details.t1_name, details.t1_decimals);

    let spacing = TickSpacing::from_fee(details.fee);
    println!("Current Pool Tick: {}", current_tick);
    println!("Derived Tick Spacing (from fee {}): {}", details.fee, spacing);

    let (below, above) = loop {
        let below = prompt.ask_offset(Side::Below).await?;
        let above = prompt.ask_offset(Side::Above).await?;
        match state.settings.resolver.resolve(current_tick, spacing, below, above) {
            Ok(range) => {
                println!("Calculated Tick Range (adjusted): {}", range);
                break (below, above);
            }
            Err(e @ (RangeError::InvalidPercentage { .. } | RangeError::InvalidTickRange { .. })) => {
                println!("{}; please enter the percentages again", e);
            }
            Err(e) => return Err(e.into()),
        }
    };

    println!(
        "Note: {} uses {} decimals and {} uses {} decimals.",
        details.t0_name, details.t0_decimals, details.t1_name, details.t1_decimals
    );
    let amount0 = prompt.ask_amount(&details.t0_name).await?;
    let amount1 = prompt.ask_amount(&details.t1_name).await?;

    let days_back = match args.days_back {
        Some(days) => days,
        None => prompt
            .ask("Enter number of days back for the backtest: ")
            .await?
            .parse::<u64>()
            .context("days back must be a whole number")?,
    };

    let plan = BacktestPlan {
        pool_address,
        below,
        above,
        amount0,
        amount1,
        days_back,
        mode,
    };

    let prepared = match prepare_backtest_for_pool(
        api,
        &state.settings,
        &plan,
        details,
        current_tick,
        now_millis(),
    )
    .await
    {
        Ok(prepared) => prepared,
        Err(ServiceError::Range(e)) => bail!("range no longer valid at the window start: {}", e),
        Err(e) => return Err(e.into()),
    };

    let window = prepared.request.window;
    match mode {
        WindowMode::Timestamp => {
            let start = chrono::DateTime::from_timestamp_millis(window.start() as i64);
            let end = chrono::DateTime::from_timestamp_millis(window.end() as i64);
            if let (Some(start), Some(end)) = (start, end) {
                println!("Backtest timestamp range: {} to {}", start.to_rfc3339(), end.to_rfc3339());
            }
            if let Some(entry_tick) = prepared.entry_tick {
                println!("Pool Tick at start timestamp: {}", entry_tick);
            }
            println!("Recalculated Tick Range (adjusted): {}", prepared.request.range);
        }
        WindowMode::Block => {
            println!("Backtest block range: {} to {}", window.start(), window.end());
        }
    }

    println!("Running {} for pool {}...", prepared.request.method(), plan.pool_address);
    let token0 = prepared.pool.t0_name.clone();
    let token1 = prepared.pool.t1_name.clone();
    let outcome = submit_backtest(api, prepared).await?;

    println!();
    print!("{}", render_summary(&outcome.statistics, &token0, &token1));
    Ok(())
}

/// Lists pools and asks which one to backtest. `None` when the user backs out.
async fn choose_pool<A: OkuApi + Sync>(
    api: &A,
    state: &AppState,
    prompt: &mut Prompter,
) -> Result<Option<String>> {
    let limit = prompt
        .ask("Enter number of pools to list: ")
        .await?
        .parse::<usize>()
        .unwrap_or(state.default_pool_limit)
        .max(1);
    let min_tvl_usd = prompt
        .ask("Enter minimum TVL threshold (USD): ")
        .await?
        .parse::<f64>()
        .unwrap_or(0.0)
        .max(0.0);

    println!("Fetching active pools sorted by TVL (first {})...", limit);
    let pools = list_pools(api, &PoolFilter { limit, min_tvl_usd }).await?;
    if pools.is_empty() {
        println!("No pools meet your criteria.");
        return Ok(None);
    }

    println!("Filtered Active Pools:");
    for pool in &pools {
        let apr = pool
            .estimated_apr()
            .map(|apr| format!("{:.2}%", apr))
            .unwrap_or_else(|| "N/A".to_string());
        println!("Pool Address: {}", pool.address);
        println!("Pair Name: {}", pool.pair_name());
        println!("TVL (USD): {}", pool.tvl_usd);
        println!("APR: {}", apr);
        println!("----------------------------");
    }

    let proceed = prompt
        .ask("Do you want to run a backtest on one of these pools? (yes/no): ")
        .await?
        .to_lowercase();
    if !matches!(proceed.as_str(), "y" | "yes") {
        println!("Exiting backtest.");
        return Ok(None);
    }

    let default_address = pools[0].address.clone();
    let pool_address = prompt
        .ask(&format!("Enter pool address for backtest (default: {}): ", default_address))
        .await?;
    if pool_address.is_empty() {
        Ok(Some(default_address))
    } else {
        Ok(Some(pool_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_timestamp_window() {
        let args = Args::try_parse_from(["backtest_cli"]).unwrap();
        assert_eq!(WindowMode::from(args.mode), WindowMode::Timestamp);
        assert!(args.pool.is_none());
        assert!(args.days_back.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn mode_flag_selects_block_window() {
        let args = Args::try_parse_from(["backtest_cli", "--mode", "block"]).unwrap();
        assert_eq!(WindowMode::from(args.mode), WindowMode::Block);

        let args = Args::try_parse_from(["backtest_cli", "-m", "timestamp"]).unwrap();
        assert_eq!(WindowMode::from(args.mode), WindowMode::Timestamp);
    }

    #[test]
    fn near_miss_flags_are_rejected() {
        assert!(Args::try_parse_from(["backtest_cli", "--blocks"]).is_err());
        assert!(Args::try_parse_from(["backtest_cli", "--block"]).is_err());
        assert!(Args::try_parse_from(["backtest_cli", "--mode", "blocks"]).is_err());
    }

    #[test]
    fn pool_and_days_back_skip_prompts() {
        let args = Args::try_parse_from([
            "backtest_cli",
            "--pool",
            "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640",
            "--days-back",
            "30",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.pool.as_deref(), Some("0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640"));
        assert_eq!(args.days_back, Some(30));
        assert!(args.verbose);

        assert!(Args::try_parse_from(["backtest_cli", "--days-back", "thirty"]).is_err());
    }
}
