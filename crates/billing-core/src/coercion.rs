//! Loose value coercion for billing fields.
//!
//! Input arrives as CSV text or as JSON produced by spreadsheets and ad-hoc
//! scripts, so numeric fields are often strings and string fields are often
//! numbers. Coercion never fails: anything unusable becomes `0` or `""`.

use serde_json::Value;
use tracing::trace;

/// Stateless helpers that turn loosely-typed values into record fields.
pub struct ValueCoercer;

impl ValueCoercer {
    /// Parse a decimal number from text.
    ///
    /// Surrounding whitespace is ignored. Empty, non-numeric and non-finite
    /// input (`"inf"`, `"NaN"`) yields `0.0`.
    pub fn parse_number(text: &str) -> f64 {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0.0;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => {
                trace!("coercing non-numeric value {:?} to 0", trimmed);
                0.0
            }
        }
    }

    /// Coerce a JSON value to a number.
    ///
    /// * number → itself
    /// * string → [`parse_number`](Self::parse_number)
    /// * bool   → `1.0` / `0.0`
    /// * anything else (null, arrays, objects) → `0.0`
    pub fn to_number(value: &Value) -> f64 {
        match value {
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
            Value::String(s) => Self::parse_number(s),
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Coerce a JSON value to text.
    ///
    /// Strings are returned as-is, numbers and booleans use their JSON
    /// spelling, `null` becomes the empty string and composite values are
    /// rendered as compact JSON.
    pub fn to_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        }
    }

    /// Look up `key` in a JSON object and coerce it to a number; missing
    /// keys yield `0.0`.
    pub fn number_field(obj: &serde_json::Map<String, Value>, key: &str) -> f64 {
        obj.get(key).map(Self::to_number).unwrap_or(0.0)
    }

    /// Look up `key` in a JSON object and coerce it to text; missing keys
    /// yield `""`.
    pub fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
        obj.get(key).map(Self::to_text).unwrap_or_default()
    }
}
