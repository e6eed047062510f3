//! Closed-form customer lifetime value.
//!
//! CLV = m·r / (1 + d − r), a geometric annuity of the monthly margin `m`
//! under retention `r` and discount rate `d`.

use crate::config::SensitivityConfig;
use serde::{Deserialize, Serialize};

/// Lifetime value, or 0 when `1 + d − r <= 0` (the series diverges).
/// Never returns an infinite or NaN value for finite inputs.
pub fn clv(monthly_margin: f64, retention: f64, discount_rate: f64) -> f64 {
    let denom = 1.0 + discount_rate - retention;
    if denom <= 0.0 {
        return 0.0;
    }
    let value = monthly_margin * retention / denom;
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub retention: f64,
    pub clv:       f64,
}

/// `steps` evenly spaced retention values over `[min_r, max_r]`, both ends
/// included, with the CLV at each one.
pub fn sensitivity_curve(
    monthly_margin: f64,
    discount_rate: f64,
    min_r: f64,
    max_r: f64,
    steps: usize,
) -> Vec<SensitivityPoint> {
    match steps {
        0 => Vec::new(),
        1 => vec![SensitivityPoint {
            retention: min_r,
            clv:       clv(monthly_margin, min_r, discount_rate),
        }],
        _ => {
            let step = (max_r - min_r) / (steps - 1) as f64;
            (0..steps)
                .map(|i| {
                    let retention = if i == steps - 1 { max_r } else { min_r + step * i as f64 };
                    SensitivityPoint {
                        retention,
                        clv: clv(monthly_margin, retention, discount_rate),
                    }
                })
                .collect()
        }
    }
}

/// Sensitivity curve over the configured retention domain.
pub fn sensitivity_from_config(
    monthly_margin: f64,
    discount_rate: f64,
    cfg: &SensitivityConfig,
) -> Vec<SensitivityPoint> {
    sensitivity_curve(
        monthly_margin,
        discount_rate,
        cfg.min_retention,
        cfg.max_retention,
        cfg.steps,
    )
}
