//! CSV ingestion adapter — raw retail exports to the Transaction Model.
//!
//! Responsibilities:
//!   - header trimming and alias harmonisation
//!   - dropping rows without a CustomerID
//!   - CustomerID normalisation ("17850.0" → "17850")
//!   - timestamp parsing across the common export layouts
//!   - merging several files in order
//!
//! Malformed rows are skipped and counted. They never abort a load.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    transaction::{Dataset, Transaction},
};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ByteRecord;
use std::{borrow::Cow, io::Read, path::Path};

const INVOICE: &str = "InvoiceNo";
const CUSTOMER: &str = "CustomerID";
const DATE: &str = "InvoiceDate";
const COUNTRY: &str = "Country";
const QUANTITY: &str = "Quantity";
const PRICE: &str = "UnitPrice";

/// Known header spellings mapped to the canonical column name.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("Invoice",     INVOICE),
    ("InvoiceNo",   INVOICE),
    ("Customer ID", CUSTOMER),
    ("CustomerID",  CUSTOMER),
    ("Price",       PRICE),
    ("UnitPrice",   PRICE),
    ("InvoiceDate", DATE),
    ("Country",     COUNTRY),
    ("Quantity",    QUANTITY),
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows_read:                usize,
    pub rows_kept:                usize,
    pub dropped_missing_customer: usize,
    pub skipped_invalid:          usize,
}

struct ColumnMap {
    invoice:  usize,
    customer: usize,
    date:     usize,
    country:  usize,
    quantity: usize,
    price:    usize,
}

impl ColumnMap {
    fn resolve(headers: &ByteRecord) -> AnalyticsResult<Self> {
        let names: Vec<String> = headers.iter().map(|h| decode(h).trim().to_string()).collect();
        let find = |canonical: &str| -> AnalyticsResult<usize> {
            names
                .iter()
                .position(|name| {
                    HEADER_ALIASES
                        .iter()
                        .any(|(alias, target)| *target == canonical && alias == name)
                })
                .ok_or_else(|| AnalyticsError::MissingColumn { column: canonical.to_string() })
        };
        Ok(Self {
            invoice:  find(INVOICE)?,
            customer: find(CUSTOMER)?,
            date:     find(DATE)?,
            country:  find(COUNTRY)?,
            quantity: find(QUANTITY)?,
            price:    find(PRICE)?,
        })
    }
}

/// Parse one CSV source into transactions.
pub fn read_transactions<R: Read>(reader: R) -> AnalyticsResult<(Vec<Transaction>, IngestStats)> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnMap::resolve(rdr.byte_headers()?)?;

    let mut stats = IngestStats::default();
    let mut out = Vec::new();
    let mut record = ByteRecord::new();

    while rdr.read_byte_record(&mut record)? {
        stats.rows_read += 1;
        let line = record.position().map_or(0, |p| p.line());
        let field = |i: usize| record.get(i).map(decode).unwrap_or(Cow::Borrowed(""));

        let Some(customer_id) = normalize_customer_id(&field(columns.customer)) else {
            stats.dropped_missing_customer += 1;
            continue;
        };

        match parse_row(&columns, &field, customer_id, line) {
            Ok(t) => out.push(t),
            Err(e) => {
                stats.skipped_invalid += 1;
                log::warn!("ingest: {e}");
            }
        }
    }

    stats.rows_kept = out.len();
    log::debug!(
        "ingest: read={} kept={} no_customer={} invalid={}",
        stats.rows_read,
        stats.rows_kept,
        stats.dropped_missing_customer,
        stats.skipped_invalid
    );
    Ok((out, stats))
}

fn parse_row<'a>(
    columns: &ColumnMap,
    field: &impl Fn(usize) -> Cow<'a, str>,
    customer_id: String,
    line: u64,
) -> AnalyticsResult<Transaction> {
    let invalid = |reason: String| AnalyticsError::InvalidRow { line, reason };

    let invoice = field(columns.invoice).trim().to_string();
    if invoice.is_empty() {
        return Err(invalid("empty invoice id".into()));
    }
    let raw_date = field(columns.date);
    let invoice_date = parse_timestamp(&raw_date)
        .ok_or_else(|| invalid(format!("unparseable InvoiceDate '{raw_date}'")))?;
    let raw_qty = field(columns.quantity);
    let quantity = parse_quantity(&raw_qty)
        .ok_or_else(|| invalid(format!("unparseable Quantity '{raw_qty}'")))?;
    let raw_price = field(columns.price);
    let unit_price: f64 = raw_price
        .trim()
        .parse()
        .map_err(|_| invalid(format!("unparseable UnitPrice '{raw_price}'")))?;
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(invalid(format!("UnitPrice must be finite and non-negative, got '{raw_price}'")));
    }

    Ok(Transaction::new(
        invoice,
        customer_id,
        invoice_date,
        field(columns.country).trim(),
        quantity,
        unit_price,
    ))
}

/// Load a single file.
pub fn load_file(path: impl AsRef<Path>) -> AnalyticsResult<(Vec<Transaction>, IngestStats)> {
    let file = std::fs::File::open(path.as_ref())?;
    read_transactions(std::io::BufReader::new(file))
}

/// Load and merge several files in order. A file that fails to load is
/// logged and skipped; the rest still make up the dataset.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Dataset {
    let mut all = Vec::new();
    for path in paths {
        match load_file(path) {
            Ok((rows, _)) => all.extend(rows),
            Err(e) => log::warn!("ingest: skipping {}: {e}", path.as_ref().display()),
        }
    }
    Dataset::new(all)
}

// ── Field parsing ────────────────────────────────────────────────────────

/// UTF-8 when valid, Latin-1 otherwise (the usual encoding of these exports).
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub fn normalize_customer_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(format!("{}", v as i64)),
        _ => Some(raw.to_string()),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}
