//! Numeric coercion and display formatting for upstream values
//!
//! Upstream sources send the same metric as a JSON number, a plain numeric
//! string, or a display string such as `"$12,345.67"`. Coercion never fails:
//! anything unparseable becomes `0.0`.

use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Parse a possibly formatted numeric string.
///
/// Currency symbols, thousands separators and whitespace are stripped, then
/// the longest leading number is read (`"$12,345.67 per token"` is
/// `12345.67`). Unparseable or non-finite input is `0.0`.
pub fn parse_numeric(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();

    cleaned[..leading_number_len(&cleaned)]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Byte length of the leading `[sign] digits [. digits] [e [sign] digits]`
/// prefix. Zero when there are no mantissa digits.
fn leading_number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_from(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits_from(end + 1 + sign);
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }

    end
}

/// Coerce a JSON value (number or string) into a number, `0.0` otherwise
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_numeric(s),
        _ => 0.0,
    }
}

/// `$0.000123`-style price with six decimals
pub fn format_price(value: f64) -> String {
    format!("${:.6}", value)
}

/// `$1234.50`-style amount with two decimals
pub fn format_amount(value: f64) -> String {
    format!("${:.2}", value)
}

/// `$12,345.678`-style value: thousands separators, at most three decimals
pub fn format_grouped(value: f64) -> String {
    format!("${}", group_thousands(value))
}

/// Compact `$1.2M` / `$12.3K` rendering for dashboards
pub fn format_compact(value: f64) -> String {
    if value == 0.0 {
        "$0".to_string()
    } else if value >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${:.0}", value)
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let grouped = int_part
        .parse::<u128>()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());

    let sign = if value < 0.0 && (int_part != "0" || !frac.is_empty()) {
        "-"
    } else {
        ""
    };

    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_formatted_currency() {
        assert_eq!(parse_numeric("$12,345.67"), 12345.67);
        assert_eq!(parse_numeric(" 1,000 "), 1000.0);
        assert_eq!(parse_numeric("42"), 42.0);
    }

    #[test]
    fn test_parse_reads_leading_number() {
        assert_eq!(parse_numeric("$12,345.67 per token"), 12345.67);
        assert_eq!(parse_numeric("1,234 tokens"), 1234.0);
        assert_eq!(parse_numeric("1.2.3"), 1.2);
        assert_eq!(parse_numeric("5000 USD"), 5000.0);
        assert_eq!(parse_numeric("-12.5%"), -12.5);
        assert_eq!(parse_numeric("2.5e3 units"), 2500.0);
        assert_eq!(parse_numeric("7e"), 7.0);
        assert_eq!(parse_numeric(".5"), 0.5);
    }

    #[test]
    fn test_parse_garbage_is_zero() {
        assert_eq!(parse_numeric("not a number"), 0.0);
        assert_eq!(parse_numeric(""), 0.0);
        assert_eq!(parse_numeric("$"), 0.0);
        assert_eq!(parse_numeric("1e999"), 0.0);
    }

    #[test]
    fn test_coerce_json_values() {
        assert_eq!(coerce_number(&json!(31.5)), 31.5);
        assert_eq!(coerce_number(&json!("$2,000")), 2000.0);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!({"v": 1})), 0.0);
    }

    #[test]
    fn test_grouping() {
        assert_eq!(format_grouped(0.0), "$0");
        assert_eq!(format_grouped(999.0), "$999");
        assert_eq!(format_grouped(1234.5), "$1,234.5");
        assert_eq!(format_grouped(1234567.891), "$1,234,567.891");
        assert_eq!(format_grouped(12345.6789), "$12,345.679");
        assert_eq!(format_grouped(-2500.0), "$-2,500");
        assert_eq!(format_grouped(1.0e15), "$1,000,000,000,000,000");
    }

    #[test]
    fn test_fixed_formats() {
        assert_eq!(format_price(0.5), "$0.500000");
        assert_eq!(format_amount(12.345), "$12.35");
    }

    #[test]
    fn test_compact() {
        assert_eq!(format_compact(0.0), "$0");
        assert_eq!(format_compact(950.0), "$950");
        assert_eq!(format_compact(12_300.0), "$12.3K");
        assert_eq!(format_compact(2_500_000.0), "$2.5M");
    }
}
