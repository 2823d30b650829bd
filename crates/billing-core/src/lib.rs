//! Core types for BillIntel.
//!
//! Billing records, aggregate and result models, the shared error type,
//! loose value coercion, currency formatting and command-line settings.

pub mod coercion;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{BillingError, Result};
