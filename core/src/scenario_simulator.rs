//! Scenario Simulator — baseline vs. what-if CLV for a target population.
//!
//! Steps:
//!   1. Resolve the target (global, one RFM segment, one cohort) against the
//!      filtered table. Segments and cohorts are recomputed here, never
//!      taken from a previous run.
//!   2. Recompute KPIs on the target's rows to get its average basket.
//!   3. Baseline margin  = basket × margin_pct
//!      Scenario margin  = basket × margin_pct × (1 − discount_pct)
//!   4. Baseline CLV uses r; scenario CLV uses min(cap, r + delta).
//!   5. Aggregate impact = (scenario − baseline) × target size.

use crate::{
    clv_model::clv,
    cohort_engine::customers_in_cohort,
    filter_engine::restrict_to_customers,
    kpi_aggregator::compute_kpis,
    rfm_engine::{compute_rfm, customers_in_segment, score_rfm, Segment},
    transaction::Transaction,
    types::{CustomerId, Month},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScenarioTarget {
    #[default]
    Global,
    Segment(Segment),
    Cohort(Month),
}

impl ScenarioTarget {
    pub fn label(&self) -> String {
        match self {
            ScenarioTarget::Global => "Global".to_string(),
            ScenarioTarget::Segment(s) => format!("Segment {}", s.label()),
            ScenarioTarget::Cohort(m) => format!("Cohort {m}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineParams {
    /// Gross margin as a fraction of basket value.
    pub margin_pct:    f64,
    pub retention:     f64,
    pub discount_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    /// Discount granted, as a fraction taken off the margin.
    pub discount_pct:    f64,
    /// Retention points added to the baseline (0.05 = +5 pts).
    pub retention_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub target:             String,
    pub population:         usize,
    pub avg_basket:         f64,
    pub baseline_margin:    f64,
    pub scenario_margin:    f64,
    pub scenario_retention: f64,
    pub baseline_clv:       f64,
    pub scenario_clv:       f64,
    pub delta_clv:          f64,
    pub aggregate_impact:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// The target resolved to zero customers.
    NoTarget { target: String },
    Evaluated(ScenarioComparison),
}

impl ScenarioOutcome {
    pub fn comparison(&self) -> Option<&ScenarioComparison> {
        match self {
            ScenarioOutcome::Evaluated(c) => Some(c),
            ScenarioOutcome::NoTarget { .. } => None,
        }
    }
}

/// Rows of the filtered table that belong to `target`.
pub fn select_target(transactions: &[Transaction], target: &ScenarioTarget) -> Vec<Transaction> {
    let customers: BTreeSet<CustomerId> = match target {
        ScenarioTarget::Global => return transactions.to_vec(),
        ScenarioTarget::Segment(segment) => {
            let scored = score_rfm(&compute_rfm(transactions));
            customers_in_segment(&scored, *segment).into_iter().collect()
        }
        ScenarioTarget::Cohort(month) => customers_in_cohort(transactions, *month),
    };
    restrict_to_customers(transactions, &customers)
}

pub fn simulate(
    transactions: &[Transaction],
    target: &ScenarioTarget,
    baseline: &BaselineParams,
    scenario: &ScenarioParams,
    retention_cap: f64,
) -> ScenarioOutcome {
    let rows = select_target(transactions, target);
    let kpis = compute_kpis(&rows);
    let population = kpis.active_customers;

    if population == 0 {
        log::info!("scenario: target '{}' has no customers", target.label());
        return ScenarioOutcome::NoTarget { target: target.label() };
    }

    let avg_basket = kpis.avg_order_value;
    let baseline_margin = avg_basket * baseline.margin_pct;
    let scenario_margin = avg_basket * baseline.margin_pct * (1.0 - scenario.discount_pct);
    let scenario_retention = retention_cap.min(baseline.retention + scenario.retention_delta);

    let baseline_clv = clv(baseline_margin, baseline.retention, baseline.discount_rate);
    let scenario_clv = clv(scenario_margin, scenario_retention, baseline.discount_rate);
    let delta_clv = scenario_clv - baseline_clv;

    log::debug!(
        "scenario: target={} n={population} clv {baseline_clv:.2} -> {scenario_clv:.2}",
        target.label()
    );

    ScenarioOutcome::Evaluated(ScenarioComparison {
        target: target.label(),
        population,
        avg_basket,
        baseline_margin,
        scenario_margin,
        scenario_retention,
        baseline_clv,
        scenario_clv,
        delta_clv,
        aggregate_impact: delta_clv * population as f64,
    })
}
