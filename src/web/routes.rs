use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use std::sync::Arc;

use crate::bootstrap::AppState;
use crate::engine::service::{list_pools, now_millis, run_backtest, BacktestPlan, PoolFilter};
use crate::error::ServiceError;
use crate::web::dto::{BacktestBody, BacktestResponse, ErrorResponse, PoolsQuery, PoolsResponse};

type ApiError = (Status, Json<ErrorResponse>);

fn api_error(status: Status, message: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: message.to_string() }))
}

/// 400 for bad input, 502 when the Oku service failed us.
pub fn status_for(error: &ServiceError) -> Status {
    if error.is_client_error() {
        Status::BadRequest
    } else {
        Status::BadGateway
    }
}

#[get("/api/v1/pools?<query..>")]
pub async fn pools(
    query: PoolsQuery,
    app_state: &State<Arc<AppState>>,
) -> Result<Json<PoolsResponse>, ApiError> {
    let filter = PoolFilter {
        limit: query.num.unwrap_or(app_state.default_pool_limit).max(1),
        min_tvl_usd: query.min_tvl.unwrap_or(0.0).max(0.0),
    };

    match list_pools(&app_state.oku, &filter).await {
        Ok(pools) => Ok(Json(PoolsResponse { pools })),
        Err(e) => {
            log::error!("Failed to list pools: {}", e);
            Err(api_error(Status::BadGateway, e))
        }
    }
}

#[post("/api/v1/backtest", data = "<body>")]
pub async fn backtest(
    body: Json<BacktestBody>,
    app_state: &State<Arc<AppState>>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let plan: BacktestPlan = body.into_inner().into();

    match run_backtest(&app_state.oku, &app_state.settings, &plan, now_millis()).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            log::error!("Backtest for {} failed: {}", plan.pool_address, e);
            Err(api_error(status_for(&e), e))
        }
    }
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
