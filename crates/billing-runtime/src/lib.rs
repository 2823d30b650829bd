//! Runtime layer for BillIntel.
//!
//! Wires the deterministic pipeline to narrative generators: the Gemini HTTP
//! narrator, the local template fallback and the service that picks between
//! them under a timeout.

pub mod gemini;
pub mod narrative;
pub mod service;
pub mod template;

pub use billing_core as core;
pub use billing_data as data;
