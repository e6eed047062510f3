//! Retail analytics core: filtering, KPIs, RFM segmentation, cohort
//! retention and closed-form CLV scenarios over an invoice-level
//! transaction log.
//!
//! Every analytical function is pure and infallible. Only the adapters
//! (config, ingestion, export) return `AnalyticsResult`.

pub mod cache;
pub mod clv_model;
pub mod cohort_engine;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter_engine;
pub mod generator;
pub mod ingest;
pub mod kpi_aggregator;
pub mod report;
pub mod rfm_engine;
pub mod rng;
pub mod scenario_simulator;
pub mod transaction;
pub mod types;
