//! Cohort Engine — acquisition-month cohorts and their ageing.
//!
//! Pipeline:
//!   1. `assign_cohorts`:  CohortMonth = first InvoiceMonth per customer
//!   2. `cohort_density`:  one row per (cohort, age, customer) with spend
//!   3. `compute_cohorts`: retention and revenue matrices folded from (2)
//!
//! Both matrices are derived from the density table, so they can never
//! disagree with it about who belongs to which cohort at which age.
//! Cohorts are re-derived on every call from the filtered table passed in.

use crate::{
    transaction::Transaction,
    types::{months_between, CustomerId, Month},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRow {
    pub cohort_month: Month,
    pub cohort_index: u32,
    pub customer_id:  CustomerId,
    /// Total Amount spent by this customer in this age bucket.
    pub amount:       f64,
    /// Transaction lines behind `amount`.
    pub lines:        usize,
}

/// A cohort × age grid. Column `i` is CohortIndex `i`; `None` marks an age
/// at which no customer of that cohort was active.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CohortMatrix {
    pub cohorts: Vec<Month>,
    pub cells:   Vec<Vec<Option<f64>>>,
}

impl CohortMatrix {
    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    /// Number of age columns (max CohortIndex + 1).
    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn row(&self, cohort: Month) -> Option<&[Option<f64>]> {
        let pos = self.cohorts.iter().position(|c| *c == cohort)?;
        self.cells.get(pos).map(Vec::as_slice)
    }

    pub fn get(&self, cohort: Month, index: u32) -> Option<f64> {
        self.row(cohort)?.get(index as usize).copied().flatten()
    }

    /// Cohort months, newest first.
    pub fn cohort_months_desc(&self) -> Vec<Month> {
        self.cohorts.iter().rev().copied().collect()
    }
}

// ── Cohort assignment ─────────────────────────────────────────────

/// CohortMonth per customer: the earliest InvoiceMonth in `transactions`.
pub fn assign_cohorts(transactions: &[Transaction]) -> BTreeMap<CustomerId, Month> {
    let mut cohorts: BTreeMap<CustomerId, Month> = BTreeMap::new();
    for t in transactions {
        cohorts
            .entry(t.customer_id.clone())
            .and_modify(|m| *m = (*m).min(t.invoice_month))
            .or_insert(t.invoice_month);
    }
    cohorts
}

/// Customers acquired in `cohort`.
pub fn customers_in_cohort(transactions: &[Transaction], cohort: Month) -> BTreeSet<CustomerId> {
    assign_cohorts(transactions)
        .into_iter()
        .filter(|(_, month)| *month == cohort)
        .map(|(customer, _)| customer)
        .collect()
}

// ── Density ───────────────────────────────────────────────────────

/// Per-customer spend per (cohort, age), ordered by cohort, age, customer.
pub fn cohort_density(transactions: &[Transaction]) -> Vec<DensityRow> {
    let cohorts = assign_cohorts(transactions);

    let mut buckets: BTreeMap<(Month, u32, &CustomerId), (f64, usize)> = BTreeMap::new();
    for t in transactions {
        let Some(&cohort_month) = cohorts.get(&t.customer_id) else {
            continue;
        };
        // Never negative: the cohort month is the customer's minimum month.
        let index = months_between(cohort_month, t.invoice_month).max(0) as u32;
        let bucket = buckets.entry((cohort_month, index, &t.customer_id)).or_default();
        bucket.0 += t.amount;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|((cohort_month, cohort_index, customer_id), (amount, lines))| DensityRow {
            cohort_month,
            cohort_index,
            customer_id: customer_id.clone(),
            amount,
            lines,
        })
        .collect()
}

// ── Matrices ──────────────────────────────────────────────────────

/// Retention and revenue matrices.
///
/// Retention: active customers at each age over the cohort's index-0
/// population, so index 0 is always 1.0. Revenue: mean line Amount of the
/// cohort's transactions at that age.
pub fn compute_cohorts(transactions: &[Transaction]) -> (CohortMatrix, CohortMatrix) {
    let density = cohort_density(transactions);
    let matrices = matrices_from_density(&density);
    log::debug!(
        "cohorts: {} cohorts, {} age columns, {} density rows",
        matrices.0.cohorts.len(),
        matrices.0.width(),
        density.len()
    );
    matrices
}

pub fn matrices_from_density(density: &[DensityRow]) -> (CohortMatrix, CohortMatrix) {
    if density.is_empty() {
        return (CohortMatrix::default(), CohortMatrix::default());
    }

    // (active customers, summed spend, lines) per cohort and age
    let mut cells: BTreeMap<Month, BTreeMap<u32, (usize, f64, usize)>> = BTreeMap::new();
    for row in density {
        let cell = cells
            .entry(row.cohort_month)
            .or_default()
            .entry(row.cohort_index)
            .or_default();
        cell.0 += 1;
        cell.1 += row.amount;
        cell.2 += row.lines;
    }

    let width = density.iter().map(|r| r.cohort_index).max().unwrap_or(0) as usize + 1;
    let cohorts: Vec<Month> = cells.keys().copied().collect();
    let mut retention = Vec::with_capacity(cohorts.len());
    let mut revenue = Vec::with_capacity(cohorts.len());

    for ages in cells.values() {
        let size = ages.get(&0).map_or(0, |(active, _, _)| *active);
        let mut retention_row = vec![None; width];
        let mut revenue_row = vec![None; width];
        for (&index, &(active, spend, lines)) in ages {
            if size > 0 {
                retention_row[index as usize] = Some(active as f64 / size as f64);
            }
            if lines > 0 {
                revenue_row[index as usize] = Some(spend / lines as f64);
            }
        }
        retention.push(retention_row);
        revenue.push(revenue_row);
    }

    (
        CohortMatrix { cohorts: cohorts.clone(), cells: retention },
        CohortMatrix { cohorts, cells: revenue },
    )
}

// ── Focus view ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub cohort_index: u32,
    pub mean_amount:  f64,
    pub customers:    usize,
}

/// Mean per-customer spend by age for a single cohort.
pub fn cohort_focus(density: &[DensityRow], cohort: Month) -> Vec<FocusPoint> {
    let mut by_index: BTreeMap<u32, (usize, f64)> = BTreeMap::new();
    for row in density.iter().filter(|r| r.cohort_month == cohort) {
        let entry = by_index.entry(row.cohort_index).or_default();
        entry.0 += 1;
        entry.1 += row.amount;
    }
    by_index
        .into_iter()
        .map(|(cohort_index, (customers, total))| FocusPoint {
            cohort_index,
            mean_amount: total / customers as f64,
            customers,
        })
        .collect()
}
