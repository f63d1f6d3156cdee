// src/chain/oku_client.rs
//
// JSON-RPC client for the Oku ("cush") pool data and backtest endpoints.
// - One POST per call: {base}/{chain}/cush/{method} with {"params": [...], "id": 1}
// - Per-attempt timeout, bounded retry with exponential backoff on transport/5xx/429
// - RPC-level errors are returned as-is, never retried

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::engine::request::BacktestRequest;
use crate::error::OkuError;

pub const DEFAULT_BASE_URL: &str = "https://omni.icarus.tools";
pub const DEFAULT_CHAIN: &str = "ethereum";

/// Pool row as returned by `topPools` and `search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub address: String,
    pub t0_name: String,
    pub t1_name: String,
    #[serde(default)]
    pub tvl_usd: f64,
    #[serde(default)]
    pub total_fees_usd: f64,
    pub fee: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr: Option<f64>,
    pub t0_decimals: u32,
    pub t1_decimals: u32,
}

impl PoolSummary {
    /// Fees over TVL annualised, in percent. `None` when TVL is not positive.
    pub fn estimated_apr(&self) -> Option<f64> {
        if self.tvl_usd > 0.0 {
            Some(self.total_fees_usd / self.tvl_usd * 365.0 * 100.0)
        } else {
            None
        }
    }

    pub fn pair_name(&self) -> String {
        format!("{} / {}", self.t0_name, self.t1_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub pools: Vec<PoolSummary>,
    #[serde(default)]
    pub result_size: Option<u64>,
}

/// `topPools` filter.
#[derive(Debug, Clone, Serialize)]
pub struct TopPoolsQuery {
    pub fee_tiers: Vec<u32>,
    pub result_size: u32,
    pub sort_by: String,
    pub sort_order: bool,
}

impl Default for TopPoolsQuery {
    fn default() -> Self {
        Self {
            fee_tiers: vec![100, 500, 3000, 10000],
            result_size: 50,
            sort_by: "tvl_usd".to_string(),
            sort_order: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickState {
    pub tick: i32,
    #[serde(default)]
    pub sqrt_price_x96: Option<Value>,
}

/// Backtest result. Known fields are typed; anything else the service adds lands in
/// `extra`. The per-block `historic_fees` series is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionStatistics {
    pub backtest_start_time: String,
    pub backtest_end_time: String,

    pub price_initial_quoted0: f64,
    pub price_final_quoted0: f64,
    pub price_initial_quoted1: f64,
    pub price_final_quoted1: f64,
    pub position_price_lower: f64,
    pub position_price_upper: f64,

    pub amount0_initial: f64,
    pub amount1_initial: f64,
    pub amount0_final: f64,
    pub amount1_final: f64,

    pub value_initial_quoted0: f64,
    pub value_now_quoted0: f64,
    pub value_if_held_quoted0: f64,
    pub value_initial_quoted1: f64,
    pub value_now_quoted1: f64,
    pub value_if_held_quoted1: f64,

    pub impermanent_loss_quoted0: f64,
    pub impermanent_loss_quoted1: f64,
    pub fees_token0: f64,
    pub fees_token1: f64,
    pub fees_quoted0: f64,
    pub fees_quoted1: f64,
    pub net_profit_quoted0: f64,
    pub net_profit_quoted1: f64,
    pub return_proportion_quoted0: f64,
    pub return_proportion_quoted1: f64,

    pub position_fee_apr0: f64,
    pub position_fee_apr1: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PositionStatistics {
    fn without_history(mut self) -> Self {
        self.extra.remove("historic_fees");
        self
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// The remote operations the workflows depend on.
pub trait OkuApi {
    fn live_block(&self) -> impl Future<Output = Result<u64, OkuError>> + Send;

    fn top_pools(
        &self,
        query: &TopPoolsQuery,
    ) -> impl Future<Output = Result<Vec<PoolSummary>, OkuError>> + Send;

    fn pool_details(
        &self,
        pool_address: &str,
    ) -> impl Future<Output = Result<PoolSummary, OkuError>> + Send;

    fn last_pool_tick(
        &self,
        pool_address: &str,
    ) -> impl Future<Output = Result<i32, OkuError>> + Send;

    fn tick_at_timestamp(
        &self,
        pool_address: &str,
        timestamp_ms: u64,
    ) -> impl Future<Output = Result<i32, OkuError>> + Send;

    fn backtest(
        &self,
        request: &BacktestRequest,
    ) -> impl Future<Output = Result<PositionStatistics, OkuError>> + Send;
}

/// Attempts and backoff for each remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(10);
        self.base_delay.saturating_mul(factor)
    }
}

pub struct OkuClient {
    client: Client,
    base_url: String,
    chain: String,
    retry: RetryPolicy,
}

impl OkuClient {
    pub fn new(
        base_url: String,
        chain: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, OkuError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| OkuError::Transport { method: "client".to_string(), source })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain,
            retry,
        })
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/{}/cush/{}", self.base_url, self.chain, method)
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    async fn post_once(&self, method: &str, body: &Value) -> Result<Value, OkuError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|source| OkuError::Transport { method: method.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OkuError::Status { method: method.to_string(), status: status.as_u16() });
        }

        let text = response
            .text()
            .await
            .map_err(|source| OkuError::Transport { method: method.to_string(), source })?;
        let rpc: RpcResponse = serde_json::from_str(&text)
            .map_err(|source| OkuError::Decode { method: method.to_string(), source })?;

        if let Some(error) = rpc.error {
            return Err(OkuError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        match rpc.result {
            Some(Value::Null) | None => Err(OkuError::MissingResult { method: method.to_string() }),
            Some(result) => Ok(result),
        }
    }

    /// Calls `method` with positional `params`, retrying transient failures.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, OkuError> {
        let body = json!({ "params": params, "id": 1 });
        log::debug!("Oku request {}: {}", method, body);

        let mut attempt = 1;
        let result = loop {
            match self.post_once(method, &body).await {
                Ok(result) => break result,
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    log::warn!(
                        "Oku {} attempt {}/{} failed: {}; retrying in {:?}",
                        method, attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        serde_json::from_value(result)
            .map_err(|source| OkuError::Decode { method: method.to_string(), source })
    }
}

impl OkuApi for OkuClient {
    async fn live_block(&self) -> Result<u64, OkuError> {
        self.call("liveBlock", json!([])).await
    }

    async fn top_pools(&self, query: &TopPoolsQuery) -> Result<Vec<PoolSummary>, OkuError> {
        let response: SearchResponse = self.call("topPools", json!([query])).await?;
        Ok(response.pools)
    }

    async fn pool_details(&self, pool_address: &str) -> Result<PoolSummary, OkuError> {
        let response: SearchResponse = self.call("search", json!([pool_address])).await?;
        response
            .pools
            .into_iter()
            .next()
            .ok_or_else(|| OkuError::PoolNotFound(pool_address.to_string()))
    }

    async fn last_pool_tick(&self, pool_address: &str) -> Result<i32, OkuError> {
        self.call("lastPoolTick", json!([pool_address])).await
    }

    async fn tick_at_timestamp(&self, pool_address: &str, timestamp_ms: u64) -> Result<i32, OkuError> {
        let state: TickState = self
            .call("poolTickStateAtTimestamp", json!([pool_address, timestamp_ms]))
            .await?;
        Ok(state.tick)
    }

    async fn backtest(&self, request: &BacktestRequest) -> Result<PositionStatistics, OkuError> {
        log::info!(
            "Submitting {} for pool {:?}: ticks {}, window {}..{}",
            request.method(),
            request.pool,
            request.range,
            request.window.start(),
            request.window.end()
        );
        let stats: PositionStatistics = self.call(request.method(), request.params()).await?;
        Ok(stats.without_history())
    }
}
