use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::oku_client::{RetryPolicy, DEFAULT_BASE_URL, DEFAULT_CHAIN};
use crate::engine::request::{ChainCadence, BLOCKS_PER_DAY, MS_PER_DAY};
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use crate::math::tick_range::TickBounds;

#[derive(Debug, Clone)]
pub struct Config {
    pub oku_base_url: String,
    pub oku_chain: String,
    pub port: u16,

    // Remote call policy
    pub oku_timeout_secs: u64,
    pub oku_max_attempts: u32,
    pub oku_retry_base_ms: u64,

    // Chain constants
    pub blocks_per_day: u64,
    pub min_tick: i32,
    pub max_tick: i32,

    pub default_pool_limit: usize,
}

/// Reads `key`, falling back to `default` when unset. A value that is set but does not
/// parse is an error rather than a silent default.
fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {:?}", key, raw).into()),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Local overrides first, then the default .env
        dotenv::from_filename("oku.env").ok();
        dotenv::dotenv().ok();

        let config = Config {
            oku_base_url: env::var("OKU_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            oku_chain: env::var("OKU_CHAIN").unwrap_or_else(|_| DEFAULT_CHAIN.to_string()),
            port: parsed_or("PORT", 8000)?,

            oku_timeout_secs: parsed_or("OKU_TIMEOUT_SECS", 10)?,
            oku_max_attempts: parsed_or("OKU_MAX_ATTEMPTS", 3)?,
            oku_retry_base_ms: parsed_or("OKU_RETRY_BASE_MS", 250)?,

            blocks_per_day: parsed_or("BLOCKS_PER_DAY", BLOCKS_PER_DAY)?,
            min_tick: parsed_or("MIN_TICK", MIN_TICK)?,
            max_tick: parsed_or("MAX_TICK", MAX_TICK)?,

            default_pool_limit: parsed_or("DEFAULT_POOL_LIMIT", 10)?,
        };

        if config.min_tick >= config.max_tick {
            return Err(format!(
                "MIN_TICK ({}) must be below MAX_TICK ({})",
                config.min_tick, config.max_tick
            )
            .into());
        }
        if config.oku_max_attempts == 0 {
            return Err("OKU_MAX_ATTEMPTS must be at least 1".into());
        }

        Ok(config)
    }

    pub fn tick_bounds(&self) -> TickBounds {
        TickBounds { min_tick: self.min_tick, max_tick: self.max_tick }
    }

    pub fn cadence(&self) -> ChainCadence {
        ChainCadence { blocks_per_day: self.blocks_per_day, ms_per_day: MS_PER_DAY }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.oku_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.oku_max_attempts,
            base_delay: Duration::from_millis(self.oku_retry_base_ms),
        }
    }
}
