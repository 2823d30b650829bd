//! Number and currency formatting for reports and fallback narratives.

/// Default currency symbol used in reports.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "KSH";

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use billing_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    // A value that rounds to zero is printed unsigned.
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount with the currency symbol, two decimal places and
/// thousands separators.
///
/// ```
/// use billing_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56, "KSH"), "KSH 1,234.56");
/// assert_eq!(format_currency(-9.5, "$"), "$ -9.50");
/// ```
pub fn format_currency(amount: f64, symbol: &str) -> String {
    format!("{} {}", symbol, format_number(amount, 2))
}

/// Short currency form for headlines: `KSH 1.2M`, `KSH 3.4K`, `KSH 999`.
pub fn format_currency_compact(amount: f64, symbol: &str) -> String {
    let abs = amount.abs();
    let sign = if amount < 0.0 { "-" } else { "" };
    if abs >= 1_000_000.0 {
        format!("{} {}{:.1}M", symbol, sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{} {}{:.1}K", symbol, sign, abs / 1_000.0)
    } else {
        format!("{} {}", symbol, format_number(amount, 0))
    }
}

/// Render a signed ratio (e.g. `0.42`) as a percentage change: `+42.0%`.
pub fn format_change(ratio: f64) -> String {
    format!("{:+.1}%", ratio * 100.0)
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
