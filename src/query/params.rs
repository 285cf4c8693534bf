//! Validated metric parameters
//!
//! Every value that ends up inside SQL text passes through one of the
//! types here first. Raw caller strings never reach the templates:
//! timestamps are re-rendered from parsed values, numbers are re-rendered
//! from integers, and free-text filters are checked and quote-escaped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::QueryError;

/// Largest `limit` accepted for ranked queries
pub const MAX_LIMIT: u64 = 1000;

const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive timestamp range, start <= end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::invalid(
                "start_date",
                "start_date must not be after end_date",
            ));
        }
        Ok(DateRange { start, end })
    }

    /// Parse two ISO-8601 timestamps
    pub fn parse(start: &str, end: &str) -> Result<Self, QueryError> {
        let start = parse_timestamp("start_date", start)?;
        let end = parse_timestamp("end_date", end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `<column> BETWEEN TIMESTAMP '...' AND TIMESTAMP '...'`
    pub fn between(&self, column: &str) -> String {
        format!(
            "{} BETWEEN TIMESTAMP '{}' AND TIMESTAMP '{}'",
            column,
            self.start.format(SQL_TIMESTAMP_FORMAT),
            self.end.format(SQL_TIMESTAMP_FORMAT)
        )
    }
}

/// Parse one ISO-8601 timestamp.
///
/// Accepts RFC 3339 with offset (normalised to UTC), `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` (both with optional fractional seconds) and a bare
/// `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(name: &str, raw: &str) -> Result<NaiveDateTime, QueryError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(QueryError::invalid(name, "must not be empty"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }

    Err(QueryError::invalid(name, "not an ISO-8601 timestamp"))
}

/// Parse a non-negative integer (digits only, no sign)
pub fn parse_non_negative(name: &str, raw: &str) -> Result<u64, QueryError> {
    let s = raw.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QueryError::invalid(name, "must be a non-negative integer"));
    }
    s.parse::<u64>()
        .map_err(|_| QueryError::invalid(name, "out of range"))
}

/// Free-text filter value safe to embed as a SQL string literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue(String);

impl FilterValue {
    /// Reject statement terminators, comment openers and control characters
    pub fn parse(name: &str, raw: &str) -> Result<Self, QueryError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(QueryError::invalid(name, "must not be empty"));
        }
        if s.len() > 128 {
            return Err(QueryError::invalid(name, "longer than 128 characters"));
        }
        if s.chars().any(char::is_control) {
            return Err(QueryError::invalid(name, "contains control characters"));
        }
        if s.contains(';') {
            return Err(QueryError::invalid(name, "contains ';'"));
        }
        if s.contains("--") || s.contains("/*") || s.contains("*/") {
            return Err(QueryError::invalid(name, "contains a SQL comment marker"));
        }
        Ok(FilterValue(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted literal with embedded quotes doubled
    pub fn sql_literal(&self) -> String {
        format!("'{}'", self.0.replace('\'', "''"))
    }
}

/// Parameters of one metric request, all validated on construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricParams {
    range: Option<DateRange>,
    threshold: Option<u64>,
    limit: Option<u64>,
    status: Option<FilterValue>,
}

impl MetricParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Result<Self, QueryError> {
        if limit == 0 || limit > MAX_LIMIT {
            return Err(QueryError::invalid(
                "limit",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }
        self.limit = Some(limit);
        Ok(self)
    }

    pub fn with_status(mut self, status: FilterValue) -> Self {
        self.status = Some(status);
        self
    }

    /// Build from `key=value` style pairs.
    ///
    /// Keys: `start_date`, `end_date`, `threshold`, `limit`, `status`.
    /// A range needs both dates.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut start = None;
        let mut end = None;
        let mut params = MetricParams::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "start_date" | "startDate" => start = Some(value.to_string()),
                "end_date" | "endDate" => end = Some(value.to_string()),
                "threshold" => {
                    params = params.with_threshold(parse_non_negative("threshold", value)?)
                }
                "limit" => params = params.with_limit(parse_non_negative("limit", value)?)?,
                "status" => params = params.with_status(FilterValue::parse("status", value)?),
                other => return Err(QueryError::invalid(other, "unknown parameter")),
            }
        }

        match (start, end) {
            (Some(start), Some(end)) => Ok(params.with_range(DateRange::parse(&start, &end)?)),
            (None, None) => Ok(params),
            (Some(_), None) => Err(QueryError::invalid("end_date", "required with start_date")),
            (None, Some(_)) => Err(QueryError::invalid("start_date", "required with end_date")),
        }
    }

    pub fn range(&self) -> Option<&DateRange> {
        self.range.as_ref()
    }

    /// Range, or an error naming the missing parameter
    pub fn require_range(&self) -> Result<&DateRange, QueryError> {
        self.range
            .as_ref()
            .ok_or_else(|| QueryError::invalid("start_date", "date range is required for this metric"))
    }

    pub fn threshold_or(&self, default: u64) -> u64 {
        self.threshold.unwrap_or(default)
    }

    pub fn limit_or(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default)
    }

    pub fn status(&self) -> Option<&FilterValue> {
        self.status.as_ref()
    }

    /// Status literal for SQL, falling back to `default`
    pub fn status_or(&self, default: &str) -> String {
        match &self.status {
            Some(status) => status.sql_literal(),
            None => FilterValue(default.to_string()).sql_literal(),
        }
    }
}
