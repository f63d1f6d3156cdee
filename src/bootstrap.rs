use crate::chain::oku_client::OkuClient;
use crate::config::Config;
use crate::engine::service::BacktestSettings;
use crate::math::tick_range::TickRangeResolver;

pub struct AppState {
    pub oku: OkuClient,
    pub settings: BacktestSettings,
    pub default_pool_limit: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let oku = OkuClient::new(
            config.oku_base_url.clone(),
            config.oku_chain.clone(),
            config.timeout(),
            config.retry_policy(),
        )?;

        log::info!(
            "Oku client ready: {} (attempts {}, timeout {}s)",
            oku.endpoint("*"),
            config.oku_max_attempts,
            config.oku_timeout_secs
        );

        Ok(AppState {
            oku,
            settings: BacktestSettings {
                resolver: TickRangeResolver::new(config.tick_bounds()),
                cadence: config.cadence(),
            },
            default_pool_limit: config.default_pool_limit,
        })
    }
}
