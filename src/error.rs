use std::fmt;

use thiserror::Error;

/// Which edge of the position an input belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Below,
    Above,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Below => f.write_str("below"),
            Side::Above => f.write_str("above"),
        }
    }
}

/// Rejections produced while framing a position. None of these are clamped away.
#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("invalid {side} percentage {value}: expected a finite value >= 0{}", upper_bound_hint(.side))]
    InvalidPercentage { side: Side, value: f64 },

    #[error("invalid tick range [{lower}, {upper}] for spacing {spacing} (below: {below}, above: {above})")]
    InvalidTickRange {
        lower: i32,
        upper: i32,
        spacing: i32,
        below: String,
        above: String,
    },

    #[error("invalid backtest window: start {start} is after end {end}")]
    InvalidWindow { start: u64, end: u64 },

    #[error("invalid tick spacing {0}: must be positive")]
    InvalidSpacing(i32),

    #[error("invalid {side} percentage input {input:?}: expected a number or \"infinite\"")]
    UnparsableOffset { side: Side, input: String },
}

fn upper_bound_hint(side: &Side) -> &'static str {
    match side {
        Side::Below => " and < 100",
        Side::Above => "",
    }
}

/// Failures talking to the Oku RPC service. Passed through untouched by the core.
#[derive(Debug, Error)]
pub enum OkuError {
    #[error("transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}")]
    Status { method: String, status: u16 },

    #[error("{method} returned RPC error {code}: {message}")]
    Rpc { method: String, code: i64, message: String },

    #[error("{method} returned no result")]
    MissingResult { method: String },

    #[error("no pool found for address {0}")]
    PoolNotFound(String),

    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl OkuError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OkuError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            OkuError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by the backtest workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Oku(#[from] OkuError),

    #[error("invalid pool address {0:?}")]
    InvalidAddress(String),

    #[error("invalid amount {0:?}: expected a decimal number")]
    InvalidAmount(String),
}

impl ServiceError {
    /// Bad caller input as opposed to an upstream or internal failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ServiceError::Oku(_))
    }
}
