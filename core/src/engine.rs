//! The analytics engine — runs the pipeline for a dataset and filter set.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Filter engine       (country, dates, customer type, returns, threshold)
//!   2. KPI aggregator
//!   3. RFM engine          (aggregate, then score)
//!   4. Segment summary
//!   5. Cohort engine       (density, then retention + revenue matrices)
//!   6. Monthly revenue trend
//!
//! RULES:
//!   - Stages 2–6 read only the filtered table from stage 1.
//!   - No stage mutates its input; each returns a new table.
//!   - Reports are memoized by (dataset digest, filter params).
//!   - The scenario simulator runs on demand against a report's table.

use crate::{
    cache::{fingerprint, AnalysisCache},
    clv_model::{sensitivity_from_config, SensitivityPoint},
    cohort_engine::{cohort_density, matrices_from_density},
    config::AnalyticsConfig,
    filter_engine::{apply_filters, CustomerClassifier, FilterParams, IdThresholdClassifier},
    kpi_aggregator::{compute_kpis, monthly_revenue},
    report::AnalysisReport,
    rfm_engine::{compute_rfm, score_rfm, segment_summary, RfmScore},
    scenario_simulator::{simulate, BaselineParams, ScenarioOutcome, ScenarioParams, ScenarioTarget},
    transaction::Dataset,
};
use std::sync::Arc;

pub struct AnalyticsEngine {
    config:     AnalyticsConfig,
    classifier: Box<dyn CustomerClassifier + Send + Sync>,
    cache:      AnalysisCache<AnalysisReport>,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        let classifier = IdThresholdClassifier::from(&config.customer_type);
        let cache = AnalysisCache::new(config.cache.capacity);
        Self {
            config,
            classifier: Box::new(classifier),
            cache,
        }
    }

    /// Swap the B2B/B2C predicate. Cached reports are dropped because they
    /// were computed under the previous predicate.
    pub fn with_classifier(mut self, classifier: Box<dyn CustomerClassifier + Send + Sync>) -> Self {
        self.classifier = classifier;
        self.cache.clear();
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Run (or reuse) the full pipeline for `params` over `dataset`.
    pub fn analyze(&mut self, dataset: &Dataset, params: &FilterParams) -> Arc<AnalysisReport> {
        let key = fingerprint(dataset, params);
        let classifier = self.classifier.as_ref();
        let config = &self.config;
        self.cache.get_or_insert_with(key.clone(), || {
            run_pipeline(dataset, params, classifier, config, key)
        })
    }

    /// Baseline vs. scenario CLV for a target within a report's filtered table.
    pub fn simulate(
        &self,
        report: &AnalysisReport,
        target: &ScenarioTarget,
        baseline: &BaselineParams,
        scenario: &ScenarioParams,
    ) -> ScenarioOutcome {
        simulate(
            &report.transactions,
            target,
            baseline,
            scenario,
            self.config.scenario.retention_cap,
        )
    }

    /// Assumptions from config, for callers that have none of their own.
    pub fn default_assumptions(&self) -> (BaselineParams, ScenarioParams) {
        let s = &self.config.scenario;
        (
            BaselineParams {
                margin_pct:    s.baseline.margin_pct,
                retention:     s.baseline.retention,
                discount_rate: s.baseline.discount_rate,
            },
            ScenarioParams {
                discount_pct:    s.scenario.discount_pct,
                retention_delta: s.scenario.retention_delta,
            },
        )
    }

    pub fn sensitivity(&self, monthly_margin: f64, discount_rate: f64) -> Vec<SensitivityPoint> {
        sensitivity_from_config(monthly_margin, discount_rate, &self.config.sensitivity)
    }

    pub fn cache_stats(&self) -> (u64, u64) {
        (self.cache.hits(), self.cache.misses())
    }
}

/// One uncached pipeline run.
pub fn run_pipeline(
    dataset: &Dataset,
    params: &FilterParams,
    classifier: &dyn CustomerClassifier,
    config: &AnalyticsConfig,
    fingerprint: String,
) -> AnalysisReport {
    let transactions = apply_filters(dataset.transactions(), params, classifier);

    let kpis = compute_kpis(&transactions);

    let rfm = score_rfm(&compute_rfm(&transactions));
    let rfm_scored = rfm.iter().all(|r| r.score != RfmScore::Insufficient) && !rfm.is_empty();

    let segments = segment_summary(&rfm, config.segments.summary_margin_pct);

    let density = cohort_density(&transactions);
    let (retention, revenue) = matrices_from_density(&density);

    let monthly_revenue = monthly_revenue(&transactions);

    log::info!(
        "pipeline: rows={} customers={} cohorts={} scored={rfm_scored}",
        transactions.len(),
        kpis.active_customers,
        retention.cohorts.len()
    );

    AnalysisReport {
        fingerprint,
        caption: params.describe(),
        filters: params.clone(),
        transactions,
        kpis,
        rfm_scored,
        rfm,
        segments,
        retention,
        revenue,
        density,
        monthly_revenue,
    }
}
