use rocket::{launch, routes};
use std::sync::Arc;

use oku_backtester::bootstrap::AppState;
use oku_backtester::config::Config;
use oku_backtester::web::routes::{backtest, health, pools};

#[launch]
async fn rocket() -> _ {
    env_logger::init();

    // Load configuration
    let config = Config::from_env()
        .expect("Failed to load configuration");

    // Build application state
    let app_state = Arc::new(
        AppState::new(&config)
            .expect("Failed to initialize application state")
    );

    // Configure Rocket
    let figment = rocket::Config::figment()
        .merge(("port", config.port))
        .merge(("address", "0.0.0.0"));

    rocket::custom(figment)
        .manage(app_state)
        .mount("/", routes![health, pools, backtest])
}
