//! CSV export of the filtered table and the RFM activation list.
//!
//! Column names are fixed so downstream spreadsheets keep working across runs.

use crate::{
    error::AnalyticsResult,
    rfm_engine::ScoredRfm,
    transaction::Transaction,
};
use serde::Serialize;
use std::{io::Write, path::Path};

pub const TRANSACTION_COLUMNS: [&str; 9] = [
    "InvoiceNo", "CustomerID", "InvoiceDate", "Country", "Quantity",
    "UnitPrice", "Amount", "IsCancellation", "InvoiceMonth",
];

pub const ACTIVATION_COLUMNS: [&str; 7] = [
    "CustomerID", "Segment", "Action", "Recency", "Frequency", "Monetary", "AvgBasket",
];

/// One row of the activation list handed to CRM tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationRow<'a> {
    #[serde(rename = "CustomerID")]
    pub customer_id: &'a str,
    #[serde(rename = "Segment")]
    pub segment:     &'static str,
    #[serde(rename = "Action")]
    pub action:      &'static str,
    #[serde(rename = "Recency")]
    pub recency:     i64,
    #[serde(rename = "Frequency")]
    pub frequency:   usize,
    #[serde(rename = "Monetary")]
    pub monetary:    f64,
    #[serde(rename = "AvgBasket")]
    pub avg_basket:  f64,
}

impl<'a> From<&'a ScoredRfm> for ActivationRow<'a> {
    fn from(row: &'a ScoredRfm) -> Self {
        Self {
            customer_id: &row.record.customer_id,
            segment:     row.segment().label(),
            action:      row.action(),
            recency:     row.record.recency,
            frequency:   row.record.frequency,
            monetary:    row.record.monetary,
            avg_basket:  row.record.avg_basket,
        }
    }
}

pub fn write_transactions<W: Write>(writer: W, transactions: &[Transaction]) -> AnalyticsResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    // serde only emits headers alongside the first row
    if transactions.is_empty() {
        wtr.write_record(TRANSACTION_COLUMNS)?;
    }
    for t in transactions {
        wtr.serialize(t)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_activation_list<W: Write>(writer: W, scored: &[ScoredRfm]) -> AnalyticsResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if scored.is_empty() {
        wtr.write_record(ACTIVATION_COLUMNS)?;
    }
    for row in scored {
        wtr.serialize(ActivationRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_transactions(path: impl AsRef<Path>, transactions: &[Transaction]) -> AnalyticsResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_transactions(file, transactions)?;
    log::info!("export: {} transactions -> {}", transactions.len(), path.as_ref().display());
    Ok(())
}

pub fn export_activation_list(path: impl AsRef<Path>, scored: &[ScoredRfm]) -> AnalyticsResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_activation_list(file, scored)?;
    log::info!("export: {} customers -> {}", scored.len(), path.as_ref().display());
    Ok(())
}
