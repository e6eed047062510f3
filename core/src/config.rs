use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Customer type ──────────────────────────────────────────────────

/// Split of customers into business and consumer classes.
///
/// The source data has no B2B/B2C attribute, so the split is a numeric
/// CustomerID threshold: ids strictly below it count as business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerTypeConfig {
    pub business_id_threshold: u64,
}

// ── CLV & scenarios ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub min_retention: f64,
    pub max_retention: f64,
    pub steps:         usize,
}

/// Baseline assumptions offered to the scenario simulator when the caller
/// does not supply its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineDefaults {
    pub margin_pct:    f64,
    pub retention:     f64,
    pub discount_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefaults {
    pub discount_pct:    f64,
    pub retention_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario retention is capped here so the CLV guard stays meaningful.
    pub retention_cap: f64,
    pub baseline:      BaselineDefaults,
    pub scenario:      ScenarioDefaults,
}

// ── Segments & cache ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummaryConfig {
    pub summary_margin_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub customer_type: CustomerTypeConfig,
    pub sensitivity:   SensitivityConfig,
    pub scenario:      ScenarioConfig,
    pub segments:      SegmentSummaryConfig,
    pub cache:         CacheConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            customer_type: CustomerTypeConfig {
                business_id_threshold: 13_000,
            },
            sensitivity: SensitivityConfig {
                min_retention: 0.10,
                max_retention: 0.99,
                steps:         20,
            },
            scenario: ScenarioConfig {
                retention_cap: 0.99,
                baseline: BaselineDefaults {
                    margin_pct:    0.40,
                    retention:     0.60,
                    discount_rate: 0.10,
                },
                scenario: ScenarioDefaults {
                    discount_pct:    0.0,
                    retention_delta: 0.05,
                },
            },
            segments: SegmentSummaryConfig {
                summary_margin_pct: 0.30,
            },
            cache: CacheConfig { capacity: 16 },
        }
    }
}

impl AnalyticsConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded analytics config from {}", path.display());
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.cache.capacity = 4;
        config
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        let s = &self.sensitivity;
        if s.steps < 2 {
            return Err(AnalyticsError::InvalidConfig(format!(
                "sensitivity.steps must be >= 2, got {}",
                s.steps
            )));
        }
        if s.min_retention >= s.max_retention {
            return Err(AnalyticsError::InvalidConfig(format!(
                "sensitivity.min_retention ({}) must be below max_retention ({})",
                s.min_retention, s.max_retention
            )));
        }
        if !(0.0..1.0).contains(&self.scenario.retention_cap) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "scenario.retention_cap must be in [0, 1), got {}",
                self.scenario.retention_cap
            )));
        }
        if self.cache.capacity == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "cache.capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
