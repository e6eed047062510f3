//! Filter Engine — global predicates applied before any aggregation.
//!
//! Order of application (fixed):
//!   1. Country
//!   2. Date range (inclusive)
//!   3. Customer type
//!   4. Returns policy
//!   5. Amount threshold (last, on the possibly neutralized Amount)
//!
//! The engine never fails. An empty result is a valid output.

use crate::{config::CustomerTypeConfig, transaction::Transaction, types::CustomerId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Parameters ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "country", rename_all = "snake_case")]
pub enum CountryFilter {
    #[default]
    All,
    Only(String),
}

/// Inclusive InvoiceDate bounds. `start <= end` is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end:   NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Whole calendar days: from midnight of `start` through the last second of `end`.
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self {
            start: start.and_time(NaiveTime::MIN),
            end:   end.and_time(last_second),
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnsMode {
    Include,
    /// Drop rows with non-positive quantity or a cancellation invoice.
    #[default]
    Exclude,
    /// Keep every row but clamp negative amounts to zero.
    Neutralize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    #[default]
    All,
    Business,
    Consumer,
}

/// The two disjoint classes a classifier sorts every customer into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerClass {
    Business,
    Consumer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterParams {
    pub country:          CountryFilter,
    pub date_range:       Option<DateRange>,
    pub returns_mode:     ReturnsMode,
    pub amount_threshold: f64,
    pub customer_type:    CustomerType,
}

impl FilterParams {
    /// One-line caption of the active filters, shown under every chart.
    pub fn describe(&self) -> String {
        let country = match &self.country {
            CountryFilter::All => "all".to_string(),
            CountryFilter::Only(c) => c.clone(),
        };
        let period = match &self.date_range {
            Some(r) => format!("{}→{}", r.start.date(), r.end.date()),
            None => "all".to_string(),
        };
        let returns = match self.returns_mode {
            ReturnsMode::Include => "include",
            ReturnsMode::Exclude => "exclude",
            ReturnsMode::Neutralize => "neutralize",
        };
        let customers = match self.customer_type {
            CustomerType::All => "all",
            CustomerType::Business => "B2B (VIP)",
            CustomerType::Consumer => "B2C (standard)",
        };
        format!(
            "Country={country} | Period={period} | Returns={returns} | Customer type={customers} | Threshold={}",
            self.amount_threshold
        )
    }
}

// ── Customer classification ────────────────────────────────────────

/// Pluggable B2B/B2C predicate.
pub trait CustomerClassifier {
    fn classify(&self, customer_id: &str) -> CustomerClass;
}

/// Numeric-id heuristic: ids below the threshold are business accounts.
/// Non-numeric ids are treated as consumers.
#[derive(Debug, Clone, Copy)]
pub struct IdThresholdClassifier {
    pub threshold: u64,
}

impl IdThresholdClassifier {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }
}

impl From<&CustomerTypeConfig> for IdThresholdClassifier {
    fn from(cfg: &CustomerTypeConfig) -> Self {
        Self::new(cfg.business_id_threshold)
    }
}

impl CustomerClassifier for IdThresholdClassifier {
    fn classify(&self, customer_id: &str) -> CustomerClass {
        match customer_id.trim().parse::<u64>() {
            Ok(id) if id < self.threshold => CustomerClass::Business,
            _ => CustomerClass::Consumer,
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// Apply every filter and return a new table. The input is never mutated.
pub fn apply_filters(
    transactions: &[Transaction],
    params: &FilterParams,
    classifier: &dyn CustomerClassifier,
) -> Vec<Transaction> {
    let mut out: Vec<Transaction> = transactions
        .iter()
        .filter(|t| match &params.country {
            CountryFilter::All => true,
            CountryFilter::Only(c) => &t.country == c,
        })
        .filter(|t| params.date_range.map_or(true, |r| r.contains(t.invoice_date)))
        .filter(|t| match params.customer_type {
            CustomerType::All => true,
            CustomerType::Business => classifier.classify(&t.customer_id) == CustomerClass::Business,
            CustomerType::Consumer => classifier.classify(&t.customer_id) == CustomerClass::Consumer,
        })
        .filter(|t| match params.returns_mode {
            ReturnsMode::Exclude => t.quantity > 0 && !t.is_cancellation,
            ReturnsMode::Include | ReturnsMode::Neutralize => true,
        })
        .cloned()
        .collect();

    if params.returns_mode == ReturnsMode::Neutralize {
        for t in &mut out {
            t.amount = t.amount.max(0.0);
        }
    }

    // A zero threshold is "off": with Include, negative rows must survive.
    if params.amount_threshold > 0.0 {
        out.retain(|t| t.amount >= params.amount_threshold);
    }

    log::debug!(
        "filters: {} of {} rows kept ({})",
        out.len(),
        transactions.len(),
        params.describe()
    );
    out
}

/// Distinct countries present in the table, sorted.
pub fn available_countries(transactions: &[Transaction]) -> Vec<String> {
    transactions
        .iter()
        .map(|t| t.country.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keep only the rows of the given customers.
pub fn restrict_to_customers(
    transactions: &[Transaction],
    customers: &BTreeSet<CustomerId>,
) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|t| customers.contains(&t.customer_id))
        .cloned()
        .collect()
}
