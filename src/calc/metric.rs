//! Derived metric values and their dashboard JSON shape

use serde_json::{Map, Number, Value as JsonValue};

use super::format::{date_label, month_label, percentage, round2};
use crate::broker::TypedValue;
use crate::pipeline::MetricKind;

/// How a derived value is meant to be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Whole number
    Count,
    /// Number rounded to two places
    Decimal,
    /// Two-decimal text with a trailing `%`
    Percentage,
    /// `"<MonthName> <Year>"`
    MonthLabel,
    /// `YYYY-MM-DD`
    IsoDate,
    /// Free text, or a nested structure
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
    /// A list of records, each an ordered set of fields
    Records(Vec<Vec<DerivedMetric>>),
    /// Named groups of fields, in first-seen order
    Groups(Vec<(String, Vec<DerivedMetric>)>),
}

impl DerivedValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DerivedValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DerivedValue::Decimal(f) => Some(*f),
            DerivedValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DerivedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Vec<DerivedMetric>]> {
        match self {
            DerivedValue::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&[(String, Vec<DerivedMetric>)]> {
        match self {
            DerivedValue::Groups(groups) => Some(groups),
            _ => None,
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            DerivedValue::Integer(i) => JsonValue::from(*i),
            DerivedValue::Decimal(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::from(0.0)),
            DerivedValue::Text(s) => JsonValue::String(s.clone()),
            DerivedValue::Records(records) => {
                JsonValue::Array(records.iter().map(|fields| fields_to_json(fields)).collect())
            }
            DerivedValue::Groups(groups) => JsonValue::Object(
                groups
                    .iter()
                    .map(|(key, fields)| (key.clone(), fields_to_json(fields)))
                    .collect(),
            ),
        }
    }
}

/// One named output field
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    pub name: String,
    pub value: DerivedValue,
    pub format: Format,
}

impl DerivedMetric {
    fn new(name: impl Into<String>, value: DerivedValue, format: Format) -> Self {
        DerivedMetric {
            name: name.into(),
            value,
            format,
        }
    }

    pub fn count(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, DerivedValue::Integer(value), Format::Count)
    }

    /// Decimal rounded to two places
    pub fn decimal(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, DerivedValue::Decimal(round2(value)), Format::Decimal)
    }

    /// Percentage text of a 0-100 value
    pub fn percentage(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, DerivedValue::Text(percentage(value)), Format::Percentage)
    }

    pub fn month(name: impl Into<String>, cell: &TypedValue) -> Self {
        Self::new(name, DerivedValue::Text(month_label(cell)), Format::MonthLabel)
    }

    pub fn date(name: impl Into<String>, cell: &TypedValue) -> Self {
        Self::new(name, DerivedValue::Text(date_label(cell)), Format::IsoDate)
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, DerivedValue::Text(value.into()), Format::Text)
    }

    pub fn records(name: impl Into<String>, records: Vec<Vec<DerivedMetric>>) -> Self {
        Self::new(name, DerivedValue::Records(records), Format::Text)
    }

    pub fn groups(name: impl Into<String>, groups: Vec<(String, Vec<DerivedMetric>)>) -> Self {
        Self::new(name, DerivedValue::Groups(groups), Format::Text)
    }
}

fn fields_to_json(fields: &[DerivedMetric]) -> JsonValue {
    let mut object = Map::with_capacity(fields.len());
    for field in fields {
        object.insert(field.name.clone(), field.value.to_json());
    }
    JsonValue::Object(object)
}

/// Everything one metric request produced
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResponse {
    pub metric: MetricKind,
    pub fields: Vec<DerivedMetric>,
}

impl MetricResponse {
    pub fn new(metric: MetricKind, fields: Vec<DerivedMetric>) -> Self {
        MetricResponse { metric, fields }
    }

    pub fn get(&self, name: &str) -> Option<&DerivedValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Dashboard JSON object; field order is kept
    pub fn to_json(&self) -> JsonValue {
        fields_to_json(&self.fields)
    }
}
