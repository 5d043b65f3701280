//! Loose value coercion shared by the sheet rows and the webhook payloads.
//!
//! Cells coming back from a spreadsheet can be numbers, padded strings or
//! empty, and the UI is not strict about types either (`"500"` and `500` are
//! both valid prices). Everything that compares or stores such values goes
//! through these helpers so the rules stay in one place.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a cell the way a spreadsheet displays it, without trimming.
///
/// Integral numbers lose their fractional part (`12.0` renders as `12`),
/// `null` renders as an empty string.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        other => other.to_string(),
    }
}

/// Trimmed text form of a cell. This is the identity used for every id match.
pub fn cell_key(value: &Value) -> String {
    cell_text(value).trim().to_string()
}

/// Numeric form of a cell. Anything unparsable becomes `0.0`.
pub fn cell_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// Truthiness as the legacy UI understands it: `null`, `false`, `0`, `""`
/// are falsy, everything else (including empty arrays) is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Build a JSON number from an `f64`, keeping integral values as integers.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::from(0))
    }
}

/// Serde helper: accept a string, number, bool or null and keep it as text.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(cell_text(&value))
}

/// Serde helper: accept anything and coerce it to `f64` (unparsable is `0`).
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(cell_number(&value))
}

/// Serde helper: like [`lenient_f64`] but rounds into an `i64`.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(cell_number(&value).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_text_renders_integral_numbers_without_fraction() {
        assert_eq!(cell_text(&json!(12)), "12");
        assert_eq!(cell_text(&json!(12.0)), "12");
        assert_eq!(cell_text(&json!(12.5)), "12.5");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_cell_key_trims_padding() {
        assert_eq!(cell_key(&json!("  C001 ")), "C001");
        assert_eq!(cell_key(&json!(" 7\t")), "7");
    }

    #[test]
    fn test_cell_number_defaults_to_zero() {
        assert_eq!(cell_number(&json!("abc")), 0.0);
        assert_eq!(cell_number(&json!(" 42 ")), 42.0);
        assert_eq!(cell_number(&json!(3.5)), 3.5);
        assert_eq!(cell_number(&Value::Null), 0.0);
        assert_eq!(cell_number(&json!("")), 0.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("x"))));
        assert!(is_truthy(Some(&json!(500))));
        assert!(is_truthy(Some(&json!([]))));
    }

    #[test]
    fn test_number_value_keeps_integers() {
        assert_eq!(number_value(500.0), json!(500));
        assert_eq!(number_value(1.25), json!(1.25));
    }
}
