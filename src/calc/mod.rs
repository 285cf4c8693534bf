//! Metric calculators
//!
//! Pure functions from joined broker results to dashboard values.
//! - **coerce**: zero-fallback reads of result cells
//! - **format**: percentages, rounding, month and date labels
//! - **metric**: derived value types and their JSON shape
//! - **kpi**: one calculator per metric

pub mod coerce;
pub mod format;
mod kpi;
mod metric;

pub use format::{percentage, round2, ZERO_PERCENT};
pub use kpi::{derive, SHIPMENT_STATUSES};
pub use metric::{DerivedMetric, DerivedValue, Format, MetricResponse};
