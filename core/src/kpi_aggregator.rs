//! KPI Aggregator — headline metrics for the overview page.
//!
//! All KPIs are zero on an empty table. There is no error path.

use crate::{
    transaction::Transaction,
    types::{CustomerId, InvoiceId},
};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_revenue:    f64,
    pub active_customers: usize,
    /// Mean basket: per-invoice Amount sums averaged over invoices.
    pub avg_order_value:  f64,
    /// Share of customers with two or more distinct invoices, in percent.
    pub repeat_rate_pct:  f64,
    /// Mean total spend per customer.
    pub empirical_clv:    f64,
}

pub fn compute_kpis(transactions: &[Transaction]) -> KpiSummary {
    if transactions.is_empty() {
        return KpiSummary::default();
    }

    let mut total_revenue = 0.0;
    let mut invoice_totals: BTreeMap<&InvoiceId, f64> = BTreeMap::new();
    let mut customer_totals: BTreeMap<&CustomerId, f64> = BTreeMap::new();
    let mut customer_invoices: BTreeMap<&CustomerId, BTreeSet<&InvoiceId>> = BTreeMap::new();

    for t in transactions {
        total_revenue += t.amount;
        *invoice_totals.entry(&t.invoice_id).or_default() += t.amount;
        *customer_totals.entry(&t.customer_id).or_default() += t.amount;
        customer_invoices
            .entry(&t.customer_id)
            .or_default()
            .insert(&t.invoice_id);
    }

    let active_customers = customer_totals.len();
    let avg_order_value = mean(invoice_totals.values().copied());
    let repeat_buyers = customer_invoices.values().filter(|inv| inv.len() >= 2).count();
    let repeat_rate_pct = if active_customers > 0 {
        repeat_buyers as f64 / active_customers as f64 * 100.0
    } else {
        0.0
    };
    let empirical_clv = mean(customer_totals.values().copied());

    KpiSummary {
        total_revenue,
        active_customers,
        avg_order_value,
        repeat_rate_pct,
        empirical_clv,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

// ── Revenue trend ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// ISO weeks, labelled by their Monday.
    Week,
    #[default]
    Month,
    Quarter,
}

impl Granularity {
    fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Quarter => {
                let first_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
            }
        }
    }

    fn next_bucket(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Quarter => start.checked_add_months(Months::new(3)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub revenue:      f64,
}

/// Revenue per time bucket, contiguous from the first to the last bucket.
/// Buckets without sales appear with zero revenue.
pub fn revenue_trend(transactions: &[Transaction], granularity: Granularity) -> Vec<TrendPoint> {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for t in transactions {
        let bucket = granularity.bucket_start(t.invoice_date.date());
        *sums.entry(bucket).or_default() += t.amount;
    }

    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let mut cursor = Some(first);
    while let Some(period_start) = cursor.filter(|d| *d <= last) {
        points.push(TrendPoint {
            period_start,
            revenue: sums.get(&period_start).copied().unwrap_or(0.0),
        });
        cursor = granularity.next_bucket(period_start);
    }
    points
}

/// Monthly trend helper used by the pipeline report.
pub fn monthly_revenue(transactions: &[Transaction]) -> Vec<TrendPoint> {
    revenue_trend(transactions, Granularity::Month)
}
