//! Output formatting: percentages, rounding and time-bucket labels

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::broker::TypedValue;

/// What every percentage renders as when there is no data
pub const ZERO_PERCENT: &str = "0.00%";

/// Label for a null time bucket
pub const NO_LABEL: &str = "N/A";

/// Two-decimal percentage text of a 0-100 value, e.g. `42.567` -> `"42.57%"`
pub fn percentage(value: f64) -> String {
    if !value.is_finite() {
        return ZERO_PERCENT.to_string();
    }
    format!("{:.2}%", round2(value))
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    // `+ 0.0` turns -0.0 into 0.0
    (value * 100.0).round() / 100.0 + 0.0
}

/// `"<MonthName> <Year>"`, e.g. `"March 2024"`
pub fn month_label(cell: &TypedValue) -> String {
    label(cell, "%B %Y")
}

/// ISO date without time of day, e.g. `"2024-03-01"`
pub fn date_label(cell: &TypedValue) -> String {
    label(cell, "%Y-%m-%d")
}

fn label(cell: &TypedValue, format: &str) -> String {
    match cell {
        TypedValue::Null => NO_LABEL.to_string(),
        TypedValue::Integer(millis) => from_epoch_millis(*millis)
            .map(|dt| dt.format(format).to_string())
            .unwrap_or_else(|| millis.to_string()),
        TypedValue::Decimal(millis) => from_epoch_millis(*millis as i64)
            .map(|dt| dt.format(format).to_string())
            .unwrap_or_else(|| millis.to_string()),
        TypedValue::Text(text) => parse_time_text(text)
            .map(|dt| dt.format(format).to_string())
            .unwrap_or_else(|| text.clone()),
    }
}

/// Epoch milliseconds, read in UTC
fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Epoch-ms digits or a timestamp / date string
fn parse_time_text(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        if let Ok(millis) = s.parse::<i64>() {
            return from_epoch_millis(millis);
        }
    }
    // "1709251200000.0", "1.7092512E12": epoch ms rendered as a float
    let has_date_separator = s.contains(':') || s.get(1..).is_some_and(|rest| rest.contains('-'));
    if !has_date_separator {
        if let Some(millis) = s.parse::<f64>().ok().filter(|f| f.is_finite()) {
            return from_epoch_millis(millis as i64);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    // "2024-03" month buckets
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(42.567), "42.57%");
        assert_eq!(percentage(0.0), ZERO_PERCENT);
        assert_eq!(percentage(100.0), "100.00%");
        assert_eq!(percentage(f64::NAN), ZERO_PERCENT);
        assert_eq!(percentage(-0.0), ZERO_PERCENT);
        assert_eq!(percentage(-0.001), ZERO_PERCENT);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1500.755), 1500.76);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(f64::INFINITY), 0.0);
        assert!(round2(-0.001).is_sign_positive());
        assert!(round2(-0.0).is_sign_positive());
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn test_month_label_wire_forms() {
        // 2024-03-01T00:00:00Z
        let millis = 1_709_251_200_000i64;
        for cell in [
            TypedValue::from("2024-03-01T00:00:00Z"),
            TypedValue::from("2024-03-01 00:00:00.0"),
            TypedValue::from("2024-03-01"),
            TypedValue::from("2024-03"),
            TypedValue::Integer(millis),
            TypedValue::Decimal(millis as f64),
            TypedValue::from(millis.to_string()),
            TypedValue::from(format!(" {} ", millis)),
            TypedValue::from("1709251200000.0"),
            TypedValue::from("1.7092512E12"),
            TypedValue::from("1.7092512e12"),
        ] {
            assert_eq!(month_label(&cell), "March 2024", "{:?}", cell);
        }
    }

    #[test]
    fn test_date_label_drops_time_of_day() {
        assert_eq!(date_label(&TypedValue::from("2024-05-17 13:45:10.0")), "2024-05-17");
        assert_eq!(date_label(&TypedValue::Integer(1_715_953_510_000)), "2024-05-17");
        assert_eq!(date_label(&TypedValue::from("1715953510000")), "2024-05-17");
    }

    #[test]
    fn test_label_fallbacks() {
        assert_eq!(month_label(&TypedValue::Null), "N/A");
        assert_eq!(date_label(&TypedValue::from("sometime")), "sometime");
    }
}
