//! RFM Engine — per-customer Recency / Frequency / Monetary aggregation,
//! quintile scoring and segment labelling.
//!
//! Scoring is all-or-nothing. Either every customer gets three scores and a
//! segment, or every customer is marked `Insufficient`. There is no partially
//! scored table.

use crate::{
    transaction::Transaction,
    types::{CustomerId, InvoiceId},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const RFM_BINS: usize = 5;
pub const MIN_SCORABLE_CUSTOMERS: usize = RFM_BINS;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmRecord {
    pub customer_id: CustomerId,
    /// Days since the last purchase, measured from max(InvoiceDate) + 1 day.
    pub recency:     i64,
    /// Distinct invoices.
    pub frequency:   usize,
    pub monetary:    f64,
    /// Mean line Amount.
    pub avg_basket:  f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfmScores {
    pub r: u8,
    pub f: u8,
    pub m: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Champions,
    Loyal,
    Potential,
    AtRisk,
    Other,
    InsufficientData,
}

impl Segment {
    pub fn label(self) -> &'static str {
        match self {
            Segment::Champions        => "Champions",
            Segment::Loyal            => "Loyal",
            Segment::Potential        => "Potential",
            Segment::AtRisk           => "At risk",
            Segment::Other            => "Other",
            Segment::InsufficientData => "Insufficient data",
        }
    }

    /// Recommended CRM action. Exactly one per segment.
    pub fn action(self) -> &'static str {
        match self {
            Segment::Champions        => "Pamper / VIP upsell",
            Segment::Loyal            => "Loyalty programme",
            Segment::Potential        => "Welcome offer",
            Segment::AtRisk           => "Urgent reactivation",
            Segment::Other            => "Email automation",
            Segment::InsufficientData => "N/A",
        }
    }

    pub fn from_label(label: &str) -> Option<Segment> {
        [
            Segment::Champions,
            Segment::Loyal,
            Segment::Potential,
            Segment::AtRisk,
            Segment::Other,
            Segment::InsufficientData,
        ]
        .into_iter()
        .find(|s| s.label().eq_ignore_ascii_case(label.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RfmScore {
    Scored {
        scores:  RfmScores,
        segment: Segment,
        action:  &'static str,
    },
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRfm {
    #[serde(flatten)]
    pub record: RfmRecord,
    pub score:  RfmScore,
}

impl ScoredRfm {
    pub fn segment(&self) -> Segment {
        match self.score {
            RfmScore::Scored { segment, .. } => segment,
            RfmScore::Insufficient => Segment::InsufficientData,
        }
    }

    pub fn action(&self) -> &'static str {
        self.segment().action()
    }

    pub fn scores(&self) -> Option<RfmScores> {
        match self.score {
            RfmScore::Scored { scores, .. } => Some(scores),
            RfmScore::Insufficient => None,
        }
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct CustomerAccumulator<'a> {
    last_purchase: Option<chrono::NaiveDateTime>,
    invoices:      HashSet<&'a InvoiceId>,
    total:         f64,
    lines:         usize,
}

/// One record per customer, ordered by CustomerID.
pub fn compute_rfm(transactions: &[Transaction]) -> Vec<RfmRecord> {
    let Some(max_date) = transactions.iter().map(|t| t.invoice_date).max() else {
        return Vec::new();
    };
    let reference = max_date + Duration::days(1);

    let mut per_customer: BTreeMap<&CustomerId, CustomerAccumulator> = BTreeMap::new();
    for t in transactions {
        let acc = per_customer.entry(&t.customer_id).or_default();
        acc.last_purchase = acc.last_purchase.max(Some(t.invoice_date));
        acc.invoices.insert(&t.invoice_id);
        acc.total += t.amount;
        acc.lines += 1;
    }

    per_customer
        .into_iter()
        .map(|(customer_id, acc)| {
            let last = acc.last_purchase.unwrap_or(max_date);
            RfmRecord {
                customer_id: customer_id.clone(),
                recency:     (reference - last).num_days(),
                frequency:   acc.invoices.len(),
                monetary:    acc.total,
                avg_basket:  acc.total / acc.lines.max(1) as f64,
            }
        })
        .collect()
}

// ── Scoring ──────────────────────────────────────────────────────────────────

pub fn score_rfm(rfm: &[RfmRecord]) -> Vec<ScoredRfm> {
    match quintile_scores(rfm) {
        Some(scores) => rfm
            .iter()
            .zip(scores)
            .map(|(record, scores)| {
                let segment = label_segment(&scores);
                ScoredRfm {
                    record: record.clone(),
                    score:  RfmScore::Scored { scores, segment, action: segment.action() },
                }
            })
            .collect(),
        None => {
            if !rfm.is_empty() {
                log::info!(
                    "rfm: scoring skipped for {} customers (insufficient data)",
                    rfm.len()
                );
            }
            rfm.iter()
                .map(|record| ScoredRfm { record: record.clone(), score: RfmScore::Insufficient })
                .collect()
        }
    }
}

fn quintile_scores(rfm: &[RfmRecord]) -> Option<Vec<RfmScores>> {
    if rfm.len() < MIN_SCORABLE_CUSTOMERS {
        return None;
    }

    let recency: Vec<f64> = rfm.iter().map(|r| r.recency as f64).collect();
    let frequency: Vec<f64> = rfm.iter().map(|r| r.frequency as f64).collect();
    let monetary: Vec<f64> = rfm.iter().map(|r| r.monetary).collect();

    // Recency is binned on raw values and may collapse; F and M are ranked
    // first so their edges are always distinct.
    let r_bins = quantile_bins(&recency)?;
    let f_bins = quantile_bins(&rank_first(&frequency))?;
    let m_bins = quantile_bins(&rank_first(&monetary))?;

    Some(
        r_bins
            .into_iter()
            .zip(f_bins)
            .zip(m_bins)
            .map(|((r, f), m)| RfmScores {
                r: (RFM_BINS - r) as u8,
                f: (f + 1) as u8,
                m: (m + 1) as u8,
            })
            .collect(),
    )
}

/// Equal-frequency bin index (0-based) per value, or `None` when two
/// quantile edges coincide.
fn quantile_bins(values: &[f64]) -> Option<Vec<usize>> {
    let edges = quantile_edges(values, RFM_BINS);
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return None;
    }
    // Right-closed intervals, lowest edge included.
    Some(
        values
            .iter()
            .map(|v| {
                let below = edges.iter().filter(|e| **e < *v).count();
                below.saturating_sub(1).min(RFM_BINS - 1)
            })
            .collect(),
    )
}

/// `bins + 1` edges at evenly spaced quantiles, linear interpolation.
fn quantile_edges(values: &[f64], bins: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let last = sorted.len().saturating_sub(1);

    (0..=bins)
        .map(|i| {
            let pos = last as f64 * i as f64 / bins as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        })
        .collect()
}

/// 1-based ranks, ties broken by position in the input.
fn rank_first(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }
    ranks
}

// ── Segment rules ────────────────────────────────────────────────────────────

type SegmentRule = (Segment, fn(&RfmScores) -> bool);

fn is_champion(s: &RfmScores) -> bool  { s.r >= 4 && s.f >= 4 && s.m >= 4 }
fn is_loyal(s: &RfmScores) -> bool     { s.r >= 4 && s.f >= 3 }
fn is_potential(s: &RfmScores) -> bool { s.r >= 3 && s.m >= 3 }
fn is_at_risk(s: &RfmScores) -> bool   { s.r <= 2 && s.f >= 3 }

/// Checked top to bottom; the first match wins, `Other` otherwise.
pub const SEGMENT_RULES: &[SegmentRule] = &[
    (Segment::Champions, is_champion),
    (Segment::Loyal,     is_loyal),
    (Segment::Potential, is_potential),
    (Segment::AtRisk,    is_at_risk),
];

pub fn label_segment(scores: &RfmScores) -> Segment {
    SEGMENT_RULES
        .iter()
        .find(|(_, matches)| matches(scores))
        .map(|(segment, _)| *segment)
        .unwrap_or(Segment::Other)
}

// ── Segment summary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment:          Segment,
    pub customers:        usize,
    pub total_revenue:    f64,
    pub avg_basket:       f64,
    pub action:           &'static str,
    pub estimated_margin: f64,
}

/// Per-segment rollup, highest revenue first.
pub fn segment_summary(scored: &[ScoredRfm], margin_pct: f64) -> Vec<SegmentSummary> {
    let mut groups: BTreeMap<Segment, (usize, f64, f64)> = BTreeMap::new();
    for row in scored {
        let entry = groups.entry(row.segment()).or_default();
        entry.0 += 1;
        entry.1 += row.record.monetary;
        entry.2 += row.record.avg_basket;
    }

    let mut summary: Vec<SegmentSummary> = groups
        .into_iter()
        .map(|(segment, (customers, revenue, basket_sum))| SegmentSummary {
            segment,
            customers,
            total_revenue: revenue,
            avg_basket: basket_sum / customers as f64,
            action: segment.action(),
            estimated_margin: revenue * margin_pct,
        })
        .collect();
    summary.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    summary
}

/// Customer ids carrying the given segment.
pub fn customers_in_segment(scored: &[ScoredRfm], segment: Segment) -> Vec<CustomerId> {
    scored
        .iter()
        .filter(|row| row.segment() == segment)
        .map(|row| row.record.customer_id.clone())
        .collect()
}
