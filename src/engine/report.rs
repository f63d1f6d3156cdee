// report.rs
// Turns the statistics returned by a backtest into derived percentages, a short verdict
// and the plain-text summary printed by the console client.

use std::fmt::Write;

use serde::Serialize;

use crate::chain::oku_client::PositionStatistics;

/// Percentages for one quote denomination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DenominationMetrics {
    pub return_pct: f64,
    /// Impermanent loss as a share of the HODL value.
    pub il_pct_of_hodl: f64,
    /// Fees as a share of the initial value.
    pub fees_pct_of_initial: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profitability {
    Both,
    Token0Only,
    Token1Only,
    Neither,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub profitability: Profitability,
    pub beat_hodl: bool,
    pub fees_covered_il: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub quoted0: DenominationMetrics,
    pub quoted1: DenominationMetrics,
    /// Change of the token0-quoted price over the window.
    pub price_change_pct: f64,
    pub assessment: Assessment,
}

fn share_pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

impl DerivedMetrics {
    pub fn from_statistics(stats: &PositionStatistics) -> Self {
        let quoted0 = DenominationMetrics {
            return_pct: stats.return_proportion_quoted0 * 100.0,
            il_pct_of_hodl: share_pct(stats.impermanent_loss_quoted0, stats.value_if_held_quoted0),
            fees_pct_of_initial: share_pct(stats.fees_quoted0, stats.value_initial_quoted0),
        };
        let quoted1 = DenominationMetrics {
            return_pct: stats.return_proportion_quoted1 * 100.0,
            il_pct_of_hodl: share_pct(stats.impermanent_loss_quoted1, stats.value_if_held_quoted1),
            fees_pct_of_initial: share_pct(stats.fees_quoted1, stats.value_initial_quoted1),
        };
        let price_change_pct = if stats.price_initial_quoted0 > 0.0 {
            (stats.price_final_quoted0 / stats.price_initial_quoted0 - 1.0) * 100.0
        } else {
            0.0
        };

        Self {
            quoted0,
            quoted1,
            price_change_pct,
            assessment: Assessment::from_statistics(stats),
        }
    }
}

impl Assessment {
    pub fn from_statistics(stats: &PositionStatistics) -> Self {
        let profitable0 = stats.net_profit_quoted0 > 0.0;
        let profitable1 = stats.net_profit_quoted1 > 0.0;
        let better0 = stats.value_now_quoted0 > stats.value_if_held_quoted0;
        let better1 = stats.value_now_quoted1 > stats.value_if_held_quoted1;

        let profitability = match (profitable0, profitable1) {
            (true, true) => Profitability::Both,
            (true, false) => Profitability::Token0Only,
            (false, true) => Profitability::Token1Only,
            (false, false) => Profitability::Neither,
        };

        Self {
            profitability,
            beat_hodl: (better0 && better1) || (better0 && profitable1) || (better1 && profitable0),
            fees_covered_il: stats.fees_quoted0 > stats.impermanent_loss_quoted0
                || stats.fees_quoted1 > stats.impermanent_loss_quoted1,
        }
    }
}

/// `+1.23` / `-1.23`; zero counts as positive.
pub fn format_with_sign(value: f64, decimals: usize) -> String {
    if value >= 0.0 {
        format!("+{:.*}", decimals, value)
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// Multi-section text summary comparing the LP position against holding.
pub fn render_summary(stats: &PositionStatistics, token0: &str, token1: &str) -> String {
    let metrics = DerivedMetrics::from_statistics(stats);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write_summary(&mut out, stats, &metrics, token0, token1);
    out
}

#[allow(clippy::too_many_arguments)]
fn write_value_section(
    out: &mut String,
    token: &str,
    initial: f64,
    now: f64,
    held: f64,
    il: f64,
    fees: f64,
    net: f64,
    metrics: &DenominationMetrics,
) -> std::fmt::Result {
    let ret = format_with_sign(metrics.return_pct, 2);
    writeln!(out, "\n--- Value & Fees (in {}) ---", token)?;
    writeln!(out, "  Initial Value:      {:.4} {}", initial, token)?;
    writeln!(out, "  Final Value:        {:.4} {} ({}%)", now, token, ret)?;
    writeln!(out, "  If Held:            {:.4} {}", held, token)?;
    writeln!(
        out,
        "  Impermanent Loss:   {:.4} {} ({:.2}% of HODL value)",
        il, token, metrics.il_pct_of_hodl
    )?;
    writeln!(
        out,
        "  Fees Earned:        {:.4} {} ({:.2}% of initial)",
        fees, token, metrics.fees_pct_of_initial
    )?;
    writeln!(out, "  Net Profit:         {:.4} {} ({}%)", net, token, ret)
}

fn write_summary(
    out: &mut String,
    stats: &PositionStatistics,
    metrics: &DerivedMetrics,
    token0: &str,
    token1: &str,
) -> std::fmt::Result {
    writeln!(out, "========== BACKTEST SUMMARY ==========")?;
    writeln!(out, "Strategy Time Range:")?;
    writeln!(out, "  Start: {}", stats.backtest_start_time)?;
    writeln!(out, "  End:   {}", stats.backtest_end_time)?;

    writeln!(out, "\n--- Strategy Details ---")?;
    writeln!(
        out,
        "  Price Range: [{:.4} , {:.4}]",
        stats.position_price_lower, stats.position_price_upper
    )?;
    writeln!(
        out,
        "  Initial Deposits: {:.4} {}, {:.4} {}",
        stats.amount0_initial, token0, stats.amount1_initial, token1
    )?;
    writeln!(
        out,
        "  Final Balances:   {:.4} {}, {:.4} {}",
        stats.amount0_final, token0, stats.amount1_final, token1
    )?;

    write_value_section(
        out,
        token0,
        stats.value_initial_quoted0,
        stats.value_now_quoted0,
        stats.value_if_held_quoted0,
        stats.impermanent_loss_quoted0,
        stats.fees_quoted0,
        stats.net_profit_quoted0,
        &metrics.quoted0,
    )?;
    write_value_section(
        out,
        token1,
        stats.value_initial_quoted1,
        stats.value_now_quoted1,
        stats.value_if_held_quoted1,
        stats.impermanent_loss_quoted1,
        stats.fees_quoted1,
        stats.net_profit_quoted1,
        &metrics.quoted1,
    )?;

    writeln!(out, "\n--- Raw Fee Earnings ---")?;
    writeln!(out, "  {} Earned:      {:.6} {}", token0, stats.fees_token0, token0)?;
    writeln!(out, "  {} Earned:      {:.6} {}", token1, stats.fees_token1, token1)?;

    writeln!(out, "\n--- Performance Metrics ---")?;
    writeln!(out, "  {} Return:      {}%", token0, format_with_sign(metrics.quoted0.return_pct, 2))?;
    writeln!(out, "  {} Return:      {}%", token1, format_with_sign(metrics.quoted1.return_pct, 2))?;
    writeln!(
        out,
        "  Price Change:        {}% ({:.4} -> {:.4} {}/{})",
        format_with_sign(metrics.price_change_pct, 2),
        stats.price_initial_quoted0,
        stats.price_final_quoted0,
        token1,
        token0
    )?;
    writeln!(out, "  Fee APR ({}):    {:.2}%", token0, stats.position_fee_apr0)?;
    writeln!(out, "  Fee APR ({}):    {:.2}%", token1, stats.position_fee_apr1)?;

    writeln!(out, "\n--- Strategy Assessment ---")?;
    let assessment = &metrics.assessment;
    match assessment.profitability {
        Profitability::Both => writeln!(
            out,
            "  [ok] Strategy was profitable in both {} and {} terms",
            token0, token1
        )?,
        Profitability::Token0Only => writeln!(
            out,
            "  [warn] Strategy was profitable in {} but not in {} terms",
            token0, token1
        )?,
        Profitability::Token1Only => writeln!(
            out,
            "  [warn] Strategy was profitable in {} but not in {} terms",
            token1, token0
        )?,
        Profitability::Neither => {
            writeln!(out, "  [fail] Strategy was not profitable in either denomination")?
        }
    }
    if assessment.beat_hodl {
        writeln!(out, "  [ok] LP strategy outperformed simple HODL strategy")?;
    } else {
        writeln!(out, "  [warn] Simple HODL would have performed better")?;
    }
    if assessment.fees_covered_il {
        writeln!(out, "  [ok] Earned fees compensated for impermanent loss")?;
    } else {
        writeln!(out, "  [warn] Impermanent loss exceeded fee earnings")?;
    }
    writeln!(out, "=======================================")
}
