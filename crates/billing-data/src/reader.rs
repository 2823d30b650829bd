//! Record normalisation for BillIntel.
//!
//! Turns CSV text or a loosely-typed JSON array into [`BillingRecord`]s, and
//! loads analysis requests from `.csv` / `.json` files on disk.
//!
//! CSV input is split on bare commas: quoting is not recognised, so a value
//! that itself contains a comma is split across columns. The `csv` reader is
//! configured with quoting disabled to keep that behaviour.

use std::collections::HashMap;
use std::path::Path;

use billing_core::coercion::ValueCoercer;
use billing_core::models::{AnalysisRequest, BillingRecord, Period};
use billing_core::{BillingError, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Largest input file accepted by [`load_request`] (10 MiB).
pub const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Column names read from CSV headers and JSON objects.
pub mod fields {
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const PLAN: &str = "plan";
    pub const DATA_USED: &str = "data_used";
    pub const AMOUNT_BILLED: &str = "amount_billed";
    pub const BILLING_DATE: &str = "billing_date";
}

// ── Normalisation ─────────────────────────────────────────────────────────────

/// Normalise whichever payload the request carries.
///
/// A non-empty `json_data` array wins over `csv_data`; blank CSV text and an
/// empty array both count as absent. Fails with [`BillingError::Input`] when
/// neither is present.
pub fn normalize_request(request: &AnalysisRequest) -> Result<Vec<BillingRecord>> {
    let csv = request
        .csv_data
        .as_deref()
        .filter(|text| !text.trim().is_empty());

    if let Some(rows) = request.json_data.as_deref().filter(|rows| !rows.is_empty()) {
        if csv.is_some() {
            debug!("both csv_data and json_data supplied; using json_data");
        }
        return coerce_json_records(rows);
    }

    match csv {
        Some(text) => parse_csv_records(text),
        None => Err(BillingError::input(
            "no billing data supplied: provide csv_data or json_data",
        )),
    }
}

/// Parse CSV text whose first line is a header row.
///
/// Records end at `\n`; a trailing `\r` is trimmed with the other field
/// whitespace and a lone `\r` inside a line is kept as data. Each later
/// non-blank line becomes one record. Header names map to values
/// by position; a missing value becomes `""` or `0`, extra values are ignored
/// and, for repeated header names, the rightmost column wins. Text with no
/// data lines yields an empty vector.
pub fn parse_csv_records(csv: &str) -> Result<Vec<BillingRecord>> {
    let text = csv.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .quoting(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BillingError::input(format!("malformed CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row =
            row.map_err(|e| BillingError::input(format!("malformed CSV row {}: {}", index + 1, e)))?;

        // Whitespace-only lines trim down to a single empty field.
        if row.len() <= 1 && row.get(0).map_or(true, str::is_empty) {
            continue;
        }

        let mut values: HashMap<&str, &str> = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            values.insert(name.as_str(), row.get(i).unwrap_or(""));
        }
        let get = |key: &str| values.get(key).copied().unwrap_or("");

        records.push(BillingRecord {
            customer_id: get(fields::CUSTOMER_ID).to_string(),
            plan: get(fields::PLAN).to_string(),
            data_used: ValueCoercer::parse_number(get(fields::DATA_USED)),
            amount_billed: ValueCoercer::parse_number(get(fields::AMOUNT_BILLED)),
            billing_date: get(fields::BILLING_DATE).to_string(),
        });
    }

    debug!(
        "parsed {} CSV records with {} columns",
        records.len(),
        headers.len()
    );
    Ok(records)
}

/// Coerce a JSON array of loosely-typed objects into records.
///
/// Numeric strings become numbers and numbers become text where a string is
/// expected. Every element must be an object.
pub fn coerce_json_records(rows: &[Value]) -> Result<Vec<BillingRecord>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row.as_object().ok_or_else(|| {
                BillingError::input(format!("json_data[{}] is not an object", i))
            })?;
            Ok(BillingRecord {
                customer_id: ValueCoercer::text_field(obj, fields::CUSTOMER_ID),
                plan: ValueCoercer::text_field(obj, fields::PLAN),
                data_used: ValueCoercer::number_field(obj, fields::DATA_USED),
                amount_billed: ValueCoercer::number_field(obj, fields::AMOUNT_BILLED),
                billing_date: ValueCoercer::text_field(obj, fields::BILLING_DATE),
            })
        })
        .collect()
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Kind of input file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Csv,
    Json,
}

impl InputKind {
    /// Classify `path` by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(InputKind::Csv),
            Some("json") => Ok(InputKind::Json),
            _ => Err(BillingError::input(format!(
                "unsupported input file {}: expected a .csv or .json file",
                path.display()
            ))),
        }
    }
}

/// Read an input file after checking its extension and size.
pub fn read_input_file(path: &Path) -> Result<(InputKind, String)> {
    let kind = InputKind::from_path(path)?;

    let metadata = std::fs::metadata(path).map_err(|source| BillingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > MAX_INPUT_BYTES {
        return Err(BillingError::input(format!(
            "{} is {} bytes; the limit is {} bytes",
            path.display(),
            metadata.len(),
            MAX_INPUT_BYTES
        )));
    }

    let text = std::fs::read_to_string(path).map_err(|source| BillingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((kind, text))
}

/// Build an [`AnalysisRequest`] from a `.csv` or `.json` file.
///
/// A JSON file may hold a record array or a full request object. A request
/// object keeps its own `period` when it has one; otherwise `period` applies.
pub fn load_request(path: &Path, period: Period) -> Result<AnalysisRequest> {
    let (kind, text) = read_input_file(path)?;
    match kind {
        InputKind::Csv => Ok(AnalysisRequest::from_csv(text, period)),
        InputKind::Json => {
            let value: Value = serde_json::from_str(&text)?;
            request_from_json(value, period)
        }
    }
}

fn request_from_json(value: Value, period: Period) -> Result<AnalysisRequest> {
    match value {
        Value::Array(rows) => Ok(AnalysisRequest::from_json(rows, period)),
        Value::Object(obj) => {
            let has_period = obj.contains_key("period");
            let mut request: AnalysisRequest = serde_json::from_value(Value::Object(obj))?;
            if !has_period {
                request.period = period;
            }
            Ok(request)
        }
        other => {
            warn!("rejecting JSON input of unexpected shape");
            Err(BillingError::input(format!(
                "JSON input must be an array of records or a request object, got {}",
                json_kind(&other)
            )))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
