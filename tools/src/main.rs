//! analytics-runner: headless driver for the retail analytics core.
//!
//! Usage:
//!   analytics-runner --input online_retail_II.csv --returns exclude
//!   analytics-runner --synthetic --seed 42 --country "United Kingdom"
//!   analytics-runner --synthetic --ipc-mode

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use retail_analytics_core::{
    config::AnalyticsConfig,
    engine::AnalyticsEngine,
    export,
    filter_engine::{available_countries, CountryFilter, CustomerType, DateRange, FilterParams, ReturnsMode},
    generator::{self, SyntheticConfig},
    ingest,
    report::AnalysisReport,
    scenario_simulator::{BaselineParams, ScenarioOutcome, ScenarioParams, ScenarioTarget},
    transaction::Dataset,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetReport,
    SetFilters {
        filters: FilterParams,
    },
    Scenario {
        #[serde(default)]
        target:   ScenarioTarget,
        baseline: Option<BaselineParams>,
        scenario: Option<ScenarioParams>,
    },
    Sensitivity {
        monthly_margin: f64,
        discount_rate:  f64,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let json = has_flag(&args, "--json");

    let config = match arg_value(&args, "--config") {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };

    let dataset = load_dataset(&args)?;
    let params = parse_filters(&args)?;

    if !ipc_mode && !json {
        println!("Retail analytics runner");
        println!("  rows:      {}", dataset.len());
        println!("  digest:    {}", &dataset.digest()[..12]);
        if let Some((first, last)) = dataset.date_bounds() {
            println!("  period:    {} → {}", first.date(), last.date());
        }
        println!("  countries: {}", available_countries(dataset.transactions()).len());
        println!("  filters:   {}", params.describe());
        println!();
    }

    let mut engine = AnalyticsEngine::new(config);

    if ipc_mode {
        return run_ipc_loop(&mut engine, &dataset, params);
    }

    let report = engine.analyze(&dataset, &params);
    if report.is_empty() {
        log::warn!("No data left after applying filters");
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        let (baseline, scenario) = engine.default_assumptions();
        let outcome = engine.simulate(&report, &ScenarioTarget::Global, &baseline, &scenario);
        print_summary(&report, &outcome);
    }

    if let Some(dir) = arg_value(&args, "--export-dir") {
        export_report(Path::new(dir), &report)?;
    }

    Ok(())
}

fn load_dataset(args: &[String]) -> Result<Dataset> {
    let inputs: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "--input")
        .map(|w| w[1].as_str())
        .collect();

    if has_flag(args, "--synthetic") || inputs.is_empty() {
        let seed = parse_arg(args, "--seed", 42u64);
        let cfg = SyntheticConfig {
            customers: parse_arg(args, "--customers", SyntheticConfig::default().customers),
            ..SyntheticConfig::default()
        };
        log::info!("Generating synthetic log (seed={seed}, customers={})", cfg.customers);
        return Ok(generator::generate(seed, &cfg));
    }

    let dataset = ingest::load_files(&inputs);
    if dataset.is_empty() {
        bail!("No transactions could be loaded from {}", inputs.join(", "));
    }
    Ok(dataset)
}

fn parse_filters(args: &[String]) -> Result<FilterParams> {
    let country = match arg_value(args, "--country") {
        Some(c) => CountryFilter::Only(c.to_string()),
        None => CountryFilter::All,
    };

    let date_range = match (arg_value(args, "--from"), arg_value(args, "--to")) {
        (Some(from), Some(to)) => Some(DateRange::days(parse_date(from)?, parse_date(to)?)),
        (None, None) => None,
        _ => bail!("--from and --to must be given together"),
    };

    let returns_mode = match arg_value(args, "--returns").unwrap_or("exclude") {
        "include" => ReturnsMode::Include,
        "exclude" => ReturnsMode::Exclude,
        "neutralize" => ReturnsMode::Neutralize,
        other => bail!("unknown --returns mode '{other}'"),
    };

    let customer_type = match arg_value(args, "--customer-type").unwrap_or("all") {
        "all" => CustomerType::All,
        "business" | "b2b" => CustomerType::Business,
        "consumer" | "b2c" => CustomerType::Consumer,
        other => bail!("unknown --customer-type '{other}'"),
    };

    Ok(FilterParams {
        country,
        date_range,
        returns_mode,
        amount_threshold: parse_arg(args, "--threshold", 0.0f64),
        customer_type,
    })
}

fn run_ipc_loop(engine: &mut AnalyticsEngine, dataset: &Dataset, mut params: FilterParams) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetReport => {
                let report = engine.analyze(dataset, &params);
                writeln!(stdout, "{}", serde_json::to_string(report.as_ref())?)?;
            }
            IpcCommand::SetFilters { filters } => {
                params = filters;
                let report = engine.analyze(dataset, &params);
                writeln!(stdout, "{}", serde_json::to_string(report.as_ref())?)?;
            }
            IpcCommand::Scenario { target, baseline, scenario } => {
                let report = engine.analyze(dataset, &params);
                let (default_baseline, default_scenario) = engine.default_assumptions();
                let outcome = engine.simulate(
                    &report,
                    &target,
                    &baseline.unwrap_or(default_baseline),
                    &scenario.unwrap_or(default_scenario),
                );
                writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
            }
            IpcCommand::Sensitivity { monthly_margin, discount_rate } => {
                let curve = engine.sensitivity(monthly_margin, discount_rate);
                writeln!(stdout, "{}", serde_json::to_string(&curve)?)?;
            }
        }
        stdout.flush()?;
    }

    let (hits, misses) = engine.cache_stats();
    log::info!("IPC session closed (cache hits={hits}, misses={misses})");
    Ok(())
}

fn print_summary(report: &AnalysisReport, outcome: &ScenarioOutcome) {
    let k = &report.kpis;
    println!("=== KPIs ===");
    println!("  total revenue:    £{:.0}", k.total_revenue);
    println!("  active customers: {}", k.active_customers);
    println!("  avg order value:  £{:.2}", k.avg_order_value);
    println!("  repeat rate:      {:.1} %", k.repeat_rate_pct);
    println!("  empirical CLV:    £{:.0}", k.empirical_clv);

    println!();
    println!("=== RFM SEGMENTS ===");
    if !report.rfm_scored {
        println!("  (Not enough customers to score)");
    }
    for s in &report.segments {
        println!(
            "  {:<18} | {:>5} customers | £{:>10.0} | basket £{:>7.2} | {}",
            s.segment.label(),
            s.customers,
            s.total_revenue,
            s.avg_basket,
            s.action
        );
    }

    println!();
    println!("=== COHORT RETENTION (Last 6 Cohorts, M+0..M+3) ===");
    if report.retention.is_empty() {
        println!("  (No cohorts)");
    }
    for (cohort, row) in report.retention.cohorts.iter().zip(&report.retention.cells).rev().take(6) {
        let cells: Vec<String> = row
            .iter()
            .take(4)
            .map(|c| c.map_or_else(|| "   -  ".to_string(), |v| format!("{:5.1}%", v * 100.0)))
            .collect();
        println!("  {} | {}", cohort.format("%Y-%m"), cells.join(" "));
    }

    println!();
    println!("=== SCENARIO (Global, default assumptions) ===");
    match outcome {
        ScenarioOutcome::Evaluated(c) => {
            println!("  population:   {}", c.population);
            println!("  baseline CLV: £{:.2}", c.baseline_clv);
            println!("  scenario CLV: £{:.2} ({:+.2})", c.scenario_clv, c.delta_clv);
            println!("  total impact: £{:.0}", c.aggregate_impact);
        }
        ScenarioOutcome::NoTarget { target } => println!("  (No customers in target {target})"),
    }
    println!();
    println!("  {}", report.caption);
}

fn export_report(dir: &Path, report: &AnalysisReport) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    export::export_transactions(dir.join("filtered_transactions.csv"), &report.transactions)?;
    export::export_activation_list(dir.join("rfm_activation_list.csv"), &report.rfm)?;
    std::fs::write(dir.join("report.json"), report.to_json()?)?;
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("Invalid date '{raw}'"))
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
