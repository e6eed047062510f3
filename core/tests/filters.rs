use chrono::{NaiveDate, NaiveDateTime};
use retail_analytics_core::{
    filter_engine::{
        apply_filters, available_countries, CountryFilter, CustomerClass, CustomerClassifier,
        CustomerType, DateRange, FilterParams, IdThresholdClassifier, ReturnsMode,
    },
    transaction::Transaction,
};
use std::collections::BTreeSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
}

fn sample_log() -> Vec<Transaction> {
    vec![
        Transaction::new("536365", "17850", ts(2010, 12, 1, 8, 26), "United Kingdom", 6, 2.55),
        Transaction::new("C536379", "17850", ts(2010, 12, 1, 9, 41), "United Kingdom", -1, 27.50),
        Transaction::new("536370", "12583", ts(2010, 12, 1, 8, 45), "France", 24, 3.75),
        Transaction::new("536380", "12583", ts(2011, 1, 5, 10, 0), "France", 0, 5.0),
        Transaction::new("536390", "13047", ts(2011, 2, 10, 12, 0), "United Kingdom", 12, 0.5),
        Transaction::new("536391", "14000", ts(2011, 3, 1, 16, 30), "Germany", -3, 4.0),
    ]
}

fn classifier() -> IdThresholdClassifier {
    IdThresholdClassifier::new(13_000)
}

fn params(returns_mode: ReturnsMode) -> FilterParams {
    FilterParams { returns_mode, ..FilterParams::default() }
}

fn customers(rows: &[Transaction]) -> BTreeSet<String> {
    rows.iter().map(|t| t.customer_id.clone()).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Include + no other predicates is the identity.
#[test]
fn pass_through_keeps_every_row() {
    let log = sample_log();
    let out = apply_filters(&log, &params(ReturnsMode::Include), &classifier());
    assert_eq!(out, log);
}

/// The input table is never modified, even when amounts are neutralized.
#[test]
fn input_table_is_not_mutated() {
    let log = sample_log();
    let before = log.clone();
    let _ = apply_filters(&log, &params(ReturnsMode::Neutralize), &classifier());
    assert_eq!(log, before);
}

#[test]
fn country_filter_is_exact_match() {
    let p = FilterParams {
        country: CountryFilter::Only("France".into()),
        ..params(ReturnsMode::Include)
    };
    let out = apply_filters(&sample_log(), &p, &classifier());
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|t| t.country == "France"));

    let p = FilterParams {
        country: CountryFilter::Only("france".into()),
        ..params(ReturnsMode::Include)
    };
    assert!(apply_filters(&sample_log(), &p, &classifier()).is_empty());
}

/// A whole-day range includes every timestamp of its last day.
#[test]
fn day_range_includes_end_of_last_day() {
    let day = NaiveDate::from_ymd_opt(2010, 12, 1).unwrap();
    let p = FilterParams {
        date_range: Some(DateRange::days(day, day)),
        ..params(ReturnsMode::Include)
    };
    let out = apply_filters(&sample_log(), &p, &classifier());
    assert_eq!(out.len(), 3, "all three 2010-12-01 rows must be kept");
}

/// Both bounds of an explicit range are inclusive.
#[test]
fn explicit_range_bounds_are_inclusive() {
    let p = FilterParams {
        date_range: Some(DateRange::new(ts(2010, 12, 1, 8, 45), ts(2011, 2, 10, 12, 0))),
        ..params(ReturnsMode::Include)
    };
    let out = apply_filters(&sample_log(), &p, &classifier());
    let invoices: Vec<&str> = out.iter().map(|t| t.invoice_id.as_str()).collect();
    assert_eq!(invoices, vec!["C536379", "536370", "536380", "536390"]);
}

/// Business and consumer classes are disjoint and together cover everyone.
#[test]
fn customer_type_split_is_disjoint_and_exhaustive() {
    let log = sample_log();
    let business = apply_filters(
        &log,
        &FilterParams { customer_type: CustomerType::Business, ..params(ReturnsMode::Include) },
        &classifier(),
    );
    let consumer = apply_filters(
        &log,
        &FilterParams { customer_type: CustomerType::Consumer, ..params(ReturnsMode::Include) },
        &classifier(),
    );

    assert_eq!(customers(&business), BTreeSet::from(["12583".to_string()]));
    assert!(customers(&business).is_disjoint(&customers(&consumer)));
    assert_eq!(business.len() + consumer.len(), log.len());
}

/// The B2B/B2C predicate is pluggable.
#[test]
fn custom_classifier_replaces_threshold() {
    struct EvenIdsAreBusiness;
    impl CustomerClassifier for EvenIdsAreBusiness {
        fn classify(&self, customer_id: &str) -> CustomerClass {
            match customer_id.parse::<u64>() {
                Ok(id) if id % 2 == 0 => CustomerClass::Business,
                _ => CustomerClass::Consumer,
            }
        }
    }

    let out = apply_filters(
        &sample_log(),
        &FilterParams { customer_type: CustomerType::Business, ..params(ReturnsMode::Include) },
        &EvenIdsAreBusiness,
    );
    assert_eq!(
        customers(&out),
        BTreeSet::from(["17850".to_string(), "14000".to_string()])
    );
}

/// Exclude drops cancellations and non-positive quantities.
#[test]
fn exclude_drops_returns_and_cancellations() {
    let out = apply_filters(&sample_log(), &params(ReturnsMode::Exclude), &classifier());
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|t| t.quantity > 0 && !t.is_cancellation));
}

/// Neutralize keeps rows and customers, never raises an amount, and leaves
/// no negative amount behind.
#[test]
fn neutralize_clamps_without_dropping() {
    let log = sample_log();
    let out = apply_filters(&log, &params(ReturnsMode::Neutralize), &classifier());

    assert_eq!(out.len(), log.len());
    assert_eq!(customers(&out), customers(&log));
    for (before, after) in log.iter().zip(&out) {
        assert!(after.amount >= 0.0, "amount {} is negative", after.amount);
        assert!(
            after.amount <= before.amount.max(0.0),
            "amount rose from {} to {}",
            before.amount,
            after.amount
        );
    }
    assert_eq!(out[1].amount, 0.0);
    assert_eq!(out[5].amount, 0.0);
}

/// The threshold keeps amounts >= threshold.
#[test]
fn threshold_is_inclusive_and_applied_last() {
    let p = FilterParams { amount_threshold: 6.0, ..params(ReturnsMode::Include) };
    let out = apply_filters(&sample_log(), &p, &classifier());
    let invoices: Vec<&str> = out.iter().map(|t| t.invoice_id.as_str()).collect();
    assert_eq!(invoices, vec!["536365", "536370", "536390"]);

    // Applied after neutralization: clamped rows sit at 0 and fall below 1.
    let p = FilterParams { amount_threshold: 1.0, ..params(ReturnsMode::Neutralize) };
    let out = apply_filters(&sample_log(), &p, &classifier());
    assert!(out.iter().all(|t| t.amount >= 1.0));
    assert_eq!(out.len(), 3);
}

/// A zero threshold is switched off, so negative rows survive Include.
#[test]
fn zero_threshold_keeps_negative_rows() {
    let out = apply_filters(&sample_log(), &params(ReturnsMode::Include), &classifier());
    assert!(out.iter().any(|t| t.amount < 0.0));
}

#[test]
fn empty_input_yields_empty_output() {
    let p = FilterParams {
        country: CountryFilter::Only("Germany".into()),
        amount_threshold: 50.0,
        ..params(ReturnsMode::Neutralize)
    };
    assert!(apply_filters(&[], &p, &classifier()).is_empty());
}

#[test]
fn countries_are_sorted_and_unique() {
    assert_eq!(
        available_countries(&sample_log()),
        vec!["France", "Germany", "United Kingdom"]
    );
}

#[test]
fn description_names_every_filter() {
    let p = FilterParams {
        country: CountryFilter::Only("EIRE".into()),
        customer_type: CustomerType::Business,
        ..params(ReturnsMode::Neutralize)
    };
    let caption = p.describe();
    assert!(caption.contains("Country=EIRE"), "{caption}");
    assert!(caption.contains("Returns=neutralize"), "{caption}");
    assert!(caption.contains("B2B"), "{caption}");
    assert!(caption.contains("Period=all"), "{caption}");
}
