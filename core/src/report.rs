//! Analysis report — every output of one pipeline run as a single value.
//!
//! The report is what the presentation layer renders and what the runner
//! serializes to JSON. The filtered transaction table travels with it for
//! export but is left out of the JSON form.

use crate::{
    cohort_engine::{CohortMatrix, DensityRow},
    filter_engine::FilterParams,
    kpi_aggregator::{KpiSummary, TrendPoint},
    rfm_engine::{ScoredRfm, SegmentSummary},
    transaction::Transaction,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub fingerprint:     String,
    pub filters:         FilterParams,
    pub caption:         String,
    #[serde(skip)]
    pub transactions:    Vec<Transaction>,
    pub kpis:            KpiSummary,
    /// False when the population was too small or too uniform to score.
    pub rfm_scored:      bool,
    pub rfm:             Vec<ScoredRfm>,
    pub segments:        Vec<SegmentSummary>,
    pub retention:       CohortMatrix,
    pub revenue:         CohortMatrix,
    pub density:         Vec<DensityRow>,
    pub monthly_revenue: Vec<TrendPoint>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
