//! Synthetic retail transaction log.
//!
//! Produces an Online-Retail-shaped table from a seed:
//!   1. Customer population: id range by customer type, country, acquisition
//!      month, monthly purchase propensity that decays with age.
//!   2. Invoices: per active month, one or more invoices of several lines.
//!   3. Cancellations: a share of lines is reversed by a `C`-prefixed invoice
//!      with negative quantity.
//!
//! Same seed, same config ⇒ identical table.

use crate::{
    rng::{RngBank, SampleRng, StreamSlot},
    transaction::{Dataset, Transaction},
};
use chrono::{Duration, Months, NaiveDate, NaiveTime};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub customers:         usize,
    pub first_month:       NaiveDate,
    pub months:            u32,
    /// (country, weight)
    pub countries:         Vec<(String, f64)>,
    pub business_share:    f64,
    /// Customer ids below this are business accounts.
    pub business_id_floor: u64,
    pub cancellation_rate: f64,
    /// Probability of buying in the acquisition month + 1.
    pub initial_propensity: f64,
    /// Multiplicative decay of the propensity per month of age.
    pub propensity_decay:   f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            customers:          400,
            first_month:        NaiveDate::from_ymd_opt(2010, 12, 1).unwrap_or_default(),
            months:             12,
            countries:          vec![
                ("United Kingdom".into(), 0.80),
                ("Germany".into(), 0.07),
                ("France".into(), 0.07),
                ("EIRE".into(), 0.04),
                ("Spain".into(), 0.02),
            ],
            business_share:     0.15,
            business_id_floor:  13_000,
            cancellation_rate:  0.02,
            initial_propensity: 0.45,
            propensity_decay:   0.90,
        }
    }
}

struct SyntheticCustomer {
    id:          String,
    country:     String,
    acquired:    u32,
    propensity:  f64,
    basket_size: f64,
}

pub fn generate(seed: u64, cfg: &SyntheticConfig) -> Dataset {
    let bank = RngBank::new(seed);
    let mut customer_rng = bank.stream(StreamSlot::Customers);
    let mut invoice_rng = bank.stream(StreamSlot::Invoices);
    let mut line_rng = bank.stream(StreamSlot::Lines);

    let population = generate_population(cfg, &mut customer_rng);
    let mut rows = Vec::new();
    let mut invoice_seq: u64 = 536_365;

    for customer in &population {
        for month in customer.acquired..cfg.months {
            let age = month - customer.acquired;
            let active = age == 0
                || invoice_rng.chance(customer.propensity * cfg.propensity_decay.powi(age as i32 - 1));
            if !active {
                continue;
            }
            let invoices = 1 + invoice_rng.next_u64_below(if age == 0 { 2 } else { 3 });
            for _ in 0..invoices {
                let Some(date) = invoice_timestamp(cfg, month, &mut invoice_rng) else {
                    continue;
                };
                invoice_seq += 1;
                push_invoice(
                    &mut rows,
                    invoice_seq,
                    customer,
                    date,
                    cfg.cancellation_rate,
                    &mut line_rng,
                );
            }
        }
    }

    rows.sort_by(|a, b| {
        a.invoice_date
            .cmp(&b.invoice_date)
            .then_with(|| a.invoice_id.cmp(&b.invoice_id))
    });
    log::debug!(
        "generator: seed={seed} customers={} rows={}",
        population.len(),
        rows.len()
    );
    Dataset::new(rows)
}

fn generate_population(cfg: &SyntheticConfig, rng: &mut SampleRng) -> Vec<SyntheticCustomer> {
    let weights: Vec<f64> = cfg.countries.iter().map(|(_, w)| *w).collect();
    let mut next_business = cfg.business_id_floor.saturating_sub(1_000);
    let mut next_consumer = cfg.business_id_floor;

    (0..cfg.customers)
        .map(|_| {
            let id = if rng.chance(cfg.business_share) && next_business < cfg.business_id_floor {
                next_business += 1;
                next_business - 1
            } else {
                next_consumer += 1;
                next_consumer - 1
            };
            let country = cfg
                .countries
                .get(rng.weighted_index(&weights))
                .map(|(c, _)| c.clone())
                .unwrap_or_else(|| "United Kingdom".to_string());
            // Earlier months acquire more customers.
            let acquired = (rng.next_f64().powi(2) * cfg.months as f64) as u32;
            SyntheticCustomer {
                id: id.to_string(),
                country,
                acquired: acquired.min(cfg.months.saturating_sub(1)),
                propensity: (cfg.initial_propensity * rng.range_f64(0.5, 1.5)).min(0.95),
                basket_size: rng.pareto(2.0, 2.5).min(12.0),
            }
        })
        .collect()
}

fn invoice_timestamp(
    cfg: &SyntheticConfig,
    month: u32,
    rng: &mut SampleRng,
) -> Option<chrono::NaiveDateTime> {
    let start = cfg.first_month.checked_add_months(Months::new(month))?;
    let next = start.checked_add_months(Months::new(1))?;
    let days = (next - start).num_days().max(1) as u64;
    let day = start + Duration::days(rng.next_u64_below(days) as i64);
    let seconds = 8 * 3600 + rng.next_u64_below(10 * 3600) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?;
    Some(day.and_time(time))
}

fn push_invoice(
    rows: &mut Vec<Transaction>,
    invoice_seq: u64,
    customer: &SyntheticCustomer,
    date: chrono::NaiveDateTime,
    cancellation_rate: f64,
    rng: &mut SampleRng,
) {
    let lines = 1 + rng.next_u64_below(customer.basket_size.ceil() as u64);
    for _ in 0..lines {
        let quantity = 1 + rng.next_u64_below(24) as i64;
        let unit_price = (rng.pareto(0.85, 2.2).min(40.0) * 100.0).round() / 100.0;
        rows.push(Transaction::new(
            invoice_seq.to_string(),
            customer.id.clone(),
            date,
            customer.country.clone(),
            quantity,
            unit_price,
        ));

        if rng.chance(cancellation_rate) {
            let returned_at = date + Duration::hours(1 + rng.next_u64_below(72) as i64);
            rows.push(Transaction::new(
                format!("C{invoice_seq}"),
                customer.id.clone(),
                returned_at,
                customer.country.clone(),
                -quantity,
                unit_price,
            ));
        }
    }
}
