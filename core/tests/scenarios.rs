use chrono::{Duration, NaiveDate, NaiveDateTime};
use retail_analytics_core::{
    rfm_engine::Segment,
    scenario_simulator::{
        select_target, simulate, BaselineParams, ScenarioOutcome, ScenarioParams, ScenarioTarget,
    },
    transaction::Transaction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const CAP: f64 = 0.99;

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(9, 30, 0).unwrap()
}

fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

/// Four customers, one invoice of 100 each; two acquired in March, two in April.
fn small_log() -> Vec<Transaction> {
    vec![
        Transaction::new("1", "17001", ts(2011, 3, 2), "United Kingdom", 4, 25.0),
        Transaction::new("2", "17002", ts(2011, 3, 9), "United Kingdom", 2, 50.0),
        Transaction::new("3", "17003", ts(2011, 4, 2), "France", 1, 100.0),
        Transaction::new("4", "17004", ts(2011, 4, 5), "France", 10, 10.0),
    ]
}

/// Ten customers ranked from least to most engaged.
fn ladder() -> Vec<Transaction> {
    let base = ts(2011, 6, 1);
    let mut log = Vec::new();
    let mut invoice = 900_000;
    for i in 1..=10i64 {
        for _ in 0..i {
            log.push(Transaction::new(
                &invoice.to_string(),
                &format!("c{i:02}"),
                base + Duration::days(i),
                "United Kingdom",
                1,
                10.0,
            ));
            invoice += 1;
        }
    }
    log
}

fn baseline() -> BaselineParams {
    BaselineParams { margin_pct: 0.40, retention: 0.60, discount_rate: 0.10 }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Basket 100, margin 40%: baseline 48, scenario 36·0.65/0.45 = 52.
#[test]
fn global_scenario_arithmetic() {
    let scenario = ScenarioParams { discount_pct: 0.10, retention_delta: 0.05 };
    let outcome = simulate(&small_log(), &ScenarioTarget::Global, &baseline(), &scenario, CAP);
    let c = outcome.comparison().expect("global target is never empty here");

    assert_eq!(c.population, 4);
    assert!(approx(c.avg_basket, 100.0));
    assert!(approx(c.baseline_margin, 40.0));
    assert!(approx(c.scenario_margin, 36.0));
    assert!(approx(c.scenario_retention, 0.65));
    assert!(approx(c.baseline_clv, 48.0), "baseline {}", c.baseline_clv);
    assert!(approx(c.scenario_clv, 52.0), "scenario {}", c.scenario_clv);
    assert!(approx(c.delta_clv, 4.0));
    assert!(approx(c.aggregate_impact, 16.0));
    assert_eq!(c.target, "Global");
}

/// Scenario retention never exceeds the cap.
#[test]
fn retention_is_capped() {
    let base = BaselineParams { retention: 0.97, ..baseline() };
    let scenario = ScenarioParams { discount_pct: 0.0, retention_delta: 0.05 };
    let outcome = simulate(&small_log(), &ScenarioTarget::Global, &base, &scenario, CAP);
    let c = outcome.comparison().unwrap();
    assert_eq!(c.scenario_retention, CAP);
    assert!(c.scenario_clv.is_finite() && c.scenario_clv > c.baseline_clv);
}

/// No change in assumptions means no delta.
#[test]
fn neutral_scenario_has_no_impact() {
    let scenario = ScenarioParams { discount_pct: 0.0, retention_delta: 0.0 };
    let outcome = simulate(&small_log(), &ScenarioTarget::Global, &baseline(), &scenario, CAP);
    let c = outcome.comparison().unwrap();
    assert!(approx(c.delta_clv, 0.0));
    assert!(approx(c.aggregate_impact, 0.0));
}

#[test]
fn empty_table_has_no_target() {
    let scenario = ScenarioParams { discount_pct: 0.1, retention_delta: 0.05 };
    let outcome = simulate(&[], &ScenarioTarget::Global, &baseline(), &scenario, CAP);
    assert!(matches!(outcome, ScenarioOutcome::NoTarget { .. }));
    assert!(outcome.comparison().is_none());
}

/// A cohort target covers only customers acquired in that month.
#[test]
fn cohort_target_restricts_population() {
    let scenario = ScenarioParams { discount_pct: 0.1, retention_delta: 0.05 };
    let target = ScenarioTarget::Cohort(month(2011, 4));
    let rows = select_target(&small_log(), &target);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|t| t.country == "France"));

    let outcome = simulate(&small_log(), &target, &baseline(), &scenario, CAP);
    assert_eq!(outcome.comparison().map(|c| c.population), Some(2));

    let empty = simulate(&small_log(), &ScenarioTarget::Cohort(month(2011, 9)), &baseline(), &scenario, CAP);
    assert_eq!(
        empty,
        ScenarioOutcome::NoTarget { target: "Cohort 2011-09-01".to_string() }
    );
}

/// Segment targets are resolved from a fresh scoring of the given rows.
#[test]
fn segment_target_uses_fresh_scores() {
    let scenario = ScenarioParams { discount_pct: 0.1, retention_delta: 0.05 };
    let outcome = simulate(
        &ladder(),
        &ScenarioTarget::Segment(Segment::Champions),
        &baseline(),
        &scenario,
        CAP,
    );
    let c = outcome.comparison().expect("champions exist in the ladder");
    assert_eq!(c.population, 4);
    assert!(approx(c.avg_basket, 10.0));
}

/// Too few customers to score: named segments are empty, the unscored
/// bucket holds everyone.
#[test]
fn unscored_table_has_no_named_segment() {
    let scenario = ScenarioParams { discount_pct: 0.1, retention_delta: 0.05 };
    let champions = simulate(
        &small_log(),
        &ScenarioTarget::Segment(Segment::Champions),
        &baseline(),
        &scenario,
        CAP,
    );
    assert!(matches!(champions, ScenarioOutcome::NoTarget { .. }));

    let unscored = simulate(
        &small_log(),
        &ScenarioTarget::Segment(Segment::InsufficientData),
        &baseline(),
        &scenario,
        CAP,
    );
    assert_eq!(unscored.comparison().map(|c| c.population), Some(4));
}

#[test]
fn target_labels() {
    assert_eq!(ScenarioTarget::Global.label(), "Global");
    assert_eq!(ScenarioTarget::Segment(Segment::AtRisk).label(), "Segment At risk");
    assert_eq!(ScenarioTarget::Cohort(month(2011, 1)).label(), "Cohort 2011-01-01");
}
