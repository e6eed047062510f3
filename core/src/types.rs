//! Shared primitive types used across the entire analytics core.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// A string-normalized customer identifier (`"17850"`, never `"17850.0"`).
pub type CustomerId = String;

/// An invoice identifier. Cancellation invoices carry a leading `C`.
pub type InvoiceId = String;

/// Calendar month, represented by its first day.
pub type Month = NaiveDate;

/// Truncate a timestamp to the first day of its calendar month.
pub fn month_start(ts: NaiveDateTime) -> Month {
    let date = ts.date();
    // Day 1 always exists for a valid year/month.
    date.with_day(1).unwrap_or(date)
}

/// Whole months between two months: `(y1 - y0) * 12 + (m1 - m0)`.
pub fn months_between(from: Month, to: Month) -> i32 {
    let years = to.year() - from.year();
    let months = to.month() as i32 - from.month() as i32;
    years * 12 + months
}
