use chrono::{Duration, NaiveDate, NaiveDateTime};
use retail_analytics_core::{
    rfm_engine::{
        compute_rfm, customers_in_segment, label_segment, score_rfm, segment_summary, RfmScore,
        RfmScores, Segment, MIN_SCORABLE_CUSTOMERS,
    },
    transaction::Transaction,
};
use std::collections::HashSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2011, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

/// Customer `c{i:02}` buys `i` invoices worth 10 each on day `i`. Higher `i`
/// is more recent, more frequent and spends more.
fn ladder(customers: usize) -> Vec<Transaction> {
    let mut log = Vec::new();
    let mut invoice = 700_000;
    for i in 1..=customers {
        let when = base() + Duration::days(i as i64);
        for _ in 0..i {
            log.push(Transaction::new(
                &invoice.to_string(),
                &format!("c{i:02}"),
                when,
                "United Kingdom",
                1,
                10.0,
            ));
            invoice += 1;
        }
    }
    log
}

fn scores(r: u8, f: u8, m: u8) -> RfmScores {
    RfmScores { r, f, m }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Recency is counted from the day after the latest purchase.
#[test]
fn aggregation_measures_from_day_after_latest_purchase() {
    let rfm = compute_rfm(&ladder(3));
    assert_eq!(rfm.len(), 3);

    let newest = rfm.iter().find(|r| r.customer_id == "c03").unwrap();
    assert_eq!(newest.recency, 1);
    assert_eq!(newest.frequency, 3);
    assert!((newest.monetary - 30.0).abs() < 1e-9);
    assert!((newest.avg_basket - 10.0).abs() < 1e-9);

    let oldest = rfm.iter().find(|r| r.customer_id == "c01").unwrap();
    assert_eq!(oldest.recency, 3);
}

#[test]
fn frequency_counts_distinct_invoices() {
    let when = base();
    let log = vec![
        Transaction::new("1", "c01", when, "France", 2, 5.0),
        Transaction::new("1", "c01", when, "France", 1, 5.0),
        Transaction::new("2", "c01", when, "France", 1, 5.0),
    ];
    let rfm = compute_rfm(&log);
    assert_eq!(rfm[0].frequency, 2);
    assert!((rfm[0].monetary - 20.0).abs() < 1e-9);
    assert!((rfm[0].avg_basket - 20.0 / 3.0).abs() < 1e-9, "mean line amount");
}

#[test]
fn empty_table_has_no_rfm_rows() {
    assert!(compute_rfm(&[]).is_empty());
    assert!(score_rfm(&[]).is_empty());
}

/// Fewer customers than bins: every row is unscored, none partially.
#[test]
fn too_few_customers_are_all_insufficient() {
    let scored = score_rfm(&compute_rfm(&ladder(MIN_SCORABLE_CUSTOMERS - 1)));
    assert_eq!(scored.len(), MIN_SCORABLE_CUSTOMERS - 1);
    for row in &scored {
        assert_eq!(row.score, RfmScore::Insufficient);
        assert_eq!(row.segment(), Segment::InsufficientData);
        assert_eq!(row.action(), "N/A");
        assert!(row.scores().is_none());
    }
}

/// Exactly the minimum population is scored, one customer per quintile.
#[test]
fn minimum_population_fills_every_quintile() {
    let scored = score_rfm(&compute_rfm(&ladder(MIN_SCORABLE_CUSTOMERS)));
    assert_eq!(scored.len(), MIN_SCORABLE_CUSTOMERS);

    for (i, row) in scored.iter().enumerate() {
        let expected = (i + 1) as u8;
        assert_eq!(
            row.scores(),
            Some(scores(expected, expected, expected)),
            "customer {}",
            row.record.customer_id
        );
    }

    let dimensions: [fn(RfmScores) -> u8; 3] = [|s| s.r, |s| s.f, |s| s.m];
    for dimension in dimensions {
        let values: HashSet<u8> = scored.iter().filter_map(|r| r.scores()).map(dimension).collect();
        assert_eq!(values, (1..=5).collect::<HashSet<u8>>());
    }
}

/// Identical recency collapses the recency edges, so nobody is scored.
#[test]
fn duplicate_recency_marks_everyone_insufficient() {
    let when = base();
    let log: Vec<Transaction> = (0..8)
        .map(|i| Transaction::new(&format!("8000{i}"), &format!("c{i}"), when, "EIRE", 1, 5.0 + i as f64))
        .collect();
    let scored = score_rfm(&compute_rfm(&log));
    assert_eq!(scored.len(), 8);
    assert!(scored.iter().all(|r| r.score == RfmScore::Insufficient));
}

/// With enough distinct customers every row gets three scores in 1..=5.
#[test]
fn ladder_scores_extremes() {
    let scored = score_rfm(&compute_rfm(&ladder(10)));
    assert_eq!(scored.len(), 10);
    for row in &scored {
        let s = row.scores().expect("every customer is scored");
        for v in [s.r, s.f, s.m] {
            assert!((1..=5).contains(&v), "score {v} out of range for {}", row.record.customer_id);
        }
    }

    let best = scored.iter().find(|r| r.record.customer_id == "c10").unwrap();
    assert_eq!(best.scores(), Some(scores(5, 5, 5)));
    assert_eq!(best.segment(), Segment::Champions);

    let worst = scored.iter().find(|r| r.record.customer_id == "c01").unwrap();
    assert_eq!(worst.scores(), Some(scores(1, 1, 1)));
    assert_eq!(worst.segment(), Segment::Other);
}

/// Identical frequencies still spread across bins once ranked.
#[test]
fn tied_frequency_is_ranked_apart() {
    let log: Vec<Transaction> = (1..=10)
        .map(|i| {
            Transaction::new(
                &format!("9000{i}"),
                &format!("c{i:02}"),
                base() + Duration::days(i),
                "United Kingdom",
                1,
                i as f64,
            )
        })
        .collect();
    let scored = score_rfm(&compute_rfm(&log));
    let f_scores: HashSet<u8> = scored.iter().filter_map(|r| r.scores()).map(|s| s.f).collect();
    assert_eq!(f_scores.len(), 5, "ranked frequency fills all five bins");
}

/// Rules are evaluated in priority order; the first match wins.
#[test]
fn segment_rules_follow_priority_order() {
    assert_eq!(label_segment(&scores(5, 5, 5)), Segment::Champions);
    assert_eq!(label_segment(&scores(4, 4, 3)), Segment::Loyal);
    assert_eq!(label_segment(&scores(4, 3, 1)), Segment::Loyal);
    assert_eq!(label_segment(&scores(4, 2, 3)), Segment::Potential);
    assert_eq!(label_segment(&scores(3, 1, 3)), Segment::Potential);
    assert_eq!(label_segment(&scores(2, 3, 1)), Segment::AtRisk);
    assert_eq!(label_segment(&scores(1, 5, 5)), Segment::AtRisk);
    assert_eq!(label_segment(&scores(3, 3, 2)), Segment::Other);
    assert_eq!(label_segment(&scores(1, 1, 1)), Segment::Other);
}

#[test]
fn every_segment_has_one_distinct_action() {
    let segments = [
        Segment::Champions,
        Segment::Loyal,
        Segment::Potential,
        Segment::AtRisk,
        Segment::Other,
    ];
    let actions: HashSet<&str> = segments.iter().map(|s| s.action()).collect();
    assert_eq!(actions.len(), segments.len());
    assert!(actions.iter().all(|a| !a.is_empty()));
    assert_eq!(Segment::InsufficientData.action(), "N/A");
}

#[test]
fn labels_round_trip_through_lookup() {
    for segment in [Segment::Champions, Segment::AtRisk, Segment::InsufficientData] {
        assert_eq!(Segment::from_label(segment.label()), Some(segment));
    }
    assert_eq!(Segment::from_label("at risk"), Some(Segment::AtRisk));
    assert_eq!(Segment::from_label("Hibernating"), None);
}

/// Summary rows cover every customer, highest revenue first.
#[test]
fn segment_summary_is_sorted_and_complete() {
    let scored = score_rfm(&compute_rfm(&ladder(10)));
    let summary = segment_summary(&scored, 0.30);

    let total: usize = summary.iter().map(|s| s.customers).sum();
    assert_eq!(total, scored.len());
    for pair in summary.windows(2) {
        assert!(pair[0].total_revenue >= pair[1].total_revenue);
    }
    for row in &summary {
        assert!((row.estimated_margin - row.total_revenue * 0.30).abs() < 1e-9);
        assert_eq!(row.action, row.segment.action());
    }
    assert_eq!(summary[0].segment, Segment::Champions);
}

#[test]
fn segment_membership_lookup() {
    let scored = score_rfm(&compute_rfm(&ladder(10)));
    let champions = customers_in_segment(&scored, Segment::Champions);
    assert!(champions.contains(&"c10".to_string()));
    assert!(!champions.contains(&"c01".to_string()));
    assert!(customers_in_segment(&scored, Segment::InsufficientData).is_empty());
}
