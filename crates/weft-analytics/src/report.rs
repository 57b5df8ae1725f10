//! Post-hoc cost analytics computed from the rolling ledger.

use serde::{Deserialize, Serialize};

use weft_core::types::LedgerEntry;

use crate::ledger::CostLedger;

const TREND_WINDOW: usize = 10;
const TREND_DEADBAND: f64 = 0.10;

/// Moving-window cost trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Decreasing => write!(f, "decreasing"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// Summary handed to dashboards and operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub runs: usize,
    pub average_cost: f64,
    pub trend: Trend,
    pub cache_hit_rate: f64,
    pub forecast_7d: f64,
    pub recommendations: Vec<String>,
}

/// Build a report from the current ledger contents.
pub fn analyze(ledger: &CostLedger) -> CostReport {
    let entries = ledger.entries();
    let runs = entries.len();

    let total: f64 = entries.iter().map(|e| e.cost).sum();
    let average_cost = if runs > 0 { total / runs as f64 } else { 0.0 };

    let hits = entries.iter().filter(|e| e.cache_hit).count();
    let cache_hit_rate = if runs > 0 { hits as f64 / runs as f64 } else { 0.0 };

    let trend = compute_trend(&entries);
    let forecast_7d = forecast(&entries, total, trend);
    let recommendations = recommend(trend, cache_hit_rate, runs);

    CostReport {
        runs,
        average_cost,
        trend,
        cache_hit_rate,
        forecast_7d,
        recommendations,
    }
}

/// Recent window average vs prior window average, with a 10% deadband.
fn compute_trend(entries: &[LedgerEntry]) -> Trend {
    if entries.len() < TREND_WINDOW * 2 {
        return Trend::Stable;
    }
    let recent = &entries[entries.len() - TREND_WINDOW..];
    let prior = &entries[entries.len() - TREND_WINDOW * 2..entries.len() - TREND_WINDOW];

    let recent_avg: f64 = recent.iter().map(|e| e.cost).sum::<f64>() / TREND_WINDOW as f64;
    let prior_avg: f64 = prior.iter().map(|e| e.cost).sum::<f64>() / TREND_WINDOW as f64;

    if prior_avg <= 0.0 {
        return Trend::Stable;
    }
    if recent_avg > prior_avg * (1.0 + TREND_DEADBAND) {
        Trend::Increasing
    } else if recent_avg < prior_avg * (1.0 - TREND_DEADBAND) {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// 7-day cost forecast from the rolling daily average, nudged by the trend.
fn forecast(entries: &[LedgerEntry], total: f64, trend: Trend) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let span_days = entries
        .last()
        .zip(entries.first())
        .map(|(last, first)| (last.timestamp - first.timestamp).num_days().max(0) as f64 + 1.0)
        .unwrap_or(1.0);
    let daily = total / span_days;
    let factor = match trend {
        Trend::Increasing => 1.0 + TREND_DEADBAND,
        Trend::Decreasing => 1.0 - TREND_DEADBAND,
        Trend::Stable => 1.0,
    };
    daily * 7.0 * factor
}

fn recommend(trend: Trend, cache_hit_rate: f64, runs: usize) -> Vec<String> {
    let mut recs = Vec::new();
    if runs >= TREND_WINDOW && cache_hit_rate < 0.2 {
        recs.push(
            "Cache hit rate is below 20%; similar prompts are not being reused".to_string(),
        );
    }
    if trend == Trend::Increasing {
        recs.push(
            "Costs are trending up; consider cheapest mode for routine queries".to_string(),
        );
    }
    if trend == Trend::Decreasing {
        recs.push("Costs are trending down; current strategy is working".to_string());
    }
    recs
}
