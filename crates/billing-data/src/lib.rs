//! Data layer for BillIntel.
//!
//! Normalises CSV and JSON billing input into records, aggregates revenue,
//! detects anomalies, scores batch health and compares saved results.

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod comparison;
pub mod reader;

pub use billing_core as core;
