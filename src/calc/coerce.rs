//! Zero-fallback cell coercion
//!
//! Dashboard fields degrade to zero instead of failing: a null, missing,
//! or unparseable cell reads as `0` / `0.0`. None of these functions
//! return errors.

use crate::broker::{RawRow, TypedValue};

/// Integer at `index`, `0` when null, missing or malformed
pub fn int_at(row: &RawRow, index: usize) -> i64 {
    row.get(index).and_then(TypedValue::try_i64).unwrap_or(0)
}

/// Decimal at `index`, `0.0` when null, missing or malformed
pub fn dec_at(row: &RawRow, index: usize) -> f64 {
    row.get(index).and_then(TypedValue::try_f64).unwrap_or(0.0)
}

/// Text at `index`, `fallback` when null or missing
pub fn text_at(row: &RawRow, index: usize, fallback: &str) -> String {
    row.get(index)
        .map(|cell| cell.text_or(fallback))
        .unwrap_or_else(|| fallback.to_string())
}

/// Integer in the first cell of the first row; `0` for an empty result
pub fn first_int(rows: &[RawRow]) -> i64 {
    rows.first().map(|row| int_at(row, 0)).unwrap_or(0)
}

/// Decimal in the first cell of the first row; `0.0` for an empty result
pub fn first_dec(rows: &[RawRow]) -> f64 {
    rows.first().map(|row| dec_at(row, 0)).unwrap_or(0.0)
}

/// `numerator / denominator`, `0.0` when the denominator is zero
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let r = numerator / denominator;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// Arithmetic mean, `0.0` for no values
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    ratio(sum, count as f64)
}
