//! Broker result cells

use serde_json::Value as JsonValue;

/// One cell of a broker result table.
///
/// Cells are stored as they arrived. Numeric interpretation of `Text`
/// is left to the calculators, since the same column can mean different
/// things to different metrics (epoch vs. literal date string).
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Integral JSON number
    Integer(i64),
    /// Non-integral JSON number
    Decimal(f64),
    /// JSON string (or any non-scalar, kept as its JSON encoding)
    Text(String),
    /// JSON null
    Null,
}

impl TypedValue {
    /// Convert a wire cell without interpreting text
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => TypedValue::Null,
            JsonValue::String(s) => TypedValue::Text(s.clone()),
            JsonValue::Bool(b) => TypedValue::Text(b.to_string()),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    TypedValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    TypedValue::Decimal(f)
                } else {
                    TypedValue::Text(n.to_string())
                }
            }
            JsonValue::Array(_) | JsonValue::Object(_) => TypedValue::Text(value.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Text view of the cell, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            TypedValue::Integer(i) => Some(i.to_string()),
            TypedValue::Decimal(f) => Some(f.to_string()),
            TypedValue::Text(s) => Some(s.clone()),
            TypedValue::Null => None,
        }
    }

    /// Text view with a fallback for null
    pub fn text_or(&self, fallback: &str) -> String {
        self.as_text().unwrap_or_else(|| fallback.to_string())
    }

    /// Integer view. `None` on null or text that is not a finite number.
    ///
    /// Decimal values truncate toward zero.
    pub fn try_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(i) => Some(*i),
            TypedValue::Decimal(f) => finite(*f).map(|f| f as i64),
            TypedValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(finite).map(|f| f as i64))
            }
            TypedValue::Null => None,
        }
    }

    /// Decimal view. `None` on null or text that is not a finite number.
    pub fn try_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer(i) => Some(*i as f64),
            TypedValue::Decimal(f) => finite(*f),
            TypedValue::Text(s) => s.trim().parse::<f64>().ok().and_then(finite),
            TypedValue::Null => None,
        }
    }
}

fn finite(f: f64) -> Option<f64> {
    if f.is_finite() {
        Some(f)
    } else {
        None
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Integer(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Decimal(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::Text(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_wire_shape() {
        assert_eq!(TypedValue::from_json(&json!("120")), TypedValue::Text("120".into()));
        assert_eq!(TypedValue::from_json(&json!(120)), TypedValue::Integer(120));
        assert_eq!(TypedValue::from_json(&json!(1.5)), TypedValue::Decimal(1.5));
        assert_eq!(TypedValue::from_json(&json!(null)), TypedValue::Null);
        assert_eq!(TypedValue::from_json(&json!(true)), TypedValue::Text("true".into()));
        assert_eq!(
            TypedValue::from_json(&json!(["a", "b"])),
            TypedValue::Text("[\"a\",\"b\"]".into())
        );
    }

    #[test]
    fn test_text_is_not_coerced_until_asked() {
        let cell = TypedValue::from("  42 ");
        assert!(matches!(cell, TypedValue::Text(_)));
        assert_eq!(cell.try_i64(), Some(42));
        assert_eq!(cell.try_f64(), Some(42.0));
    }

    #[test]
    fn test_integer_view_truncates_decimals() {
        assert_eq!(TypedValue::from("150.0").try_i64(), Some(150));
        assert_eq!(TypedValue::from("-2.9").try_i64(), Some(-2));
        assert_eq!(TypedValue::Decimal(7.99).try_i64(), Some(7));
    }

    #[test]
    fn test_malformed_and_non_finite_are_none() {
        assert_eq!(TypedValue::from("abc").try_i64(), None);
        assert_eq!(TypedValue::from("").try_f64(), None);
        assert_eq!(TypedValue::from("NaN").try_f64(), None);
        assert_eq!(TypedValue::from("inf").try_i64(), None);
        assert_eq!(TypedValue::Null.try_f64(), None);
    }

    #[test]
    fn test_text_views() {
        assert_eq!(TypedValue::Null.as_text(), None);
        assert_eq!(TypedValue::Null.text_or("N/A"), "N/A");
        assert_eq!(TypedValue::Integer(7).text_or("N/A"), "7");
    }
}
