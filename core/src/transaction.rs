//! Transaction Model — the normalized, in-memory line-item table.
//!
//! Every row carries a non-null CustomerID. Rows without one are dropped by
//! the ingestion adapter before the core ever sees them.

use crate::types::{month_start, CustomerId, InvoiceId, Month};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "InvoiceNo")]
    pub invoice_id:      InvoiceId,
    #[serde(rename = "CustomerID")]
    pub customer_id:     CustomerId,
    #[serde(rename = "InvoiceDate")]
    pub invoice_date:    NaiveDateTime,
    #[serde(rename = "Country")]
    pub country:         String,
    #[serde(rename = "Quantity")]
    pub quantity:        i64,
    #[serde(rename = "UnitPrice")]
    pub unit_price:      f64,
    #[serde(rename = "Amount")]
    pub amount:          f64,
    #[serde(rename = "IsCancellation")]
    pub is_cancellation: bool,
    #[serde(rename = "InvoiceMonth")]
    pub invoice_month:   Month,
}

impl Transaction {
    /// Build a row and derive Amount, IsCancellation and InvoiceMonth.
    pub fn new(
        invoice_id: impl Into<InvoiceId>,
        customer_id: impl Into<CustomerId>,
        invoice_date: NaiveDateTime,
        country: impl Into<String>,
        quantity: i64,
        unit_price: f64,
    ) -> Self {
        let invoice_id = invoice_id.into();
        let is_cancellation = is_cancellation_invoice(&invoice_id);
        Self {
            invoice_id,
            customer_id: customer_id.into(),
            invoice_date,
            country: country.into(),
            quantity,
            unit_price,
            amount: quantity as f64 * unit_price,
            is_cancellation,
            invoice_month: month_start(invoice_date),
        }
    }
}

/// Cancellation invoices are marked by a leading `C` (either case).
pub fn is_cancellation_invoice(invoice_id: &str) -> bool {
    invoice_id
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'C'))
}

/// An immutable transaction table plus its content digest.
///
/// The digest identifies the dataset in memoization keys, so two datasets
/// with identical rows share cached analyses.
#[derive(Debug, Clone)]
pub struct Dataset {
    transactions: Vec<Transaction>,
    digest:       String,
}

impl Dataset {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let digest = content_digest(&transactions);
        Self { transactions, digest }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Earliest and latest InvoiceDate, or `None` for an empty table.
    pub fn date_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.transactions.iter().map(|t| t.invoice_date).min()?;
        let max = self.transactions.iter().map(|t| t.invoice_date).max()?;
        Some((min, max))
    }
}

fn content_digest(transactions: &[Transaction]) -> String {
    let mut hasher = Sha256::new();
    for t in transactions {
        hasher.update(t.invoice_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(t.customer_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(t.invoice_date.and_utc().timestamp().to_le_bytes());
        hasher.update(t.country.as_bytes());
        hasher.update([0x1f]);
        hasher.update(t.quantity.to_le_bytes());
        hasher.update(t.unit_price.to_bits().to_le_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}
