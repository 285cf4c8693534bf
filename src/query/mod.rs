//! Query construction
//!
//! - **params**: validation of caller input
//! - **spec**: one statement and its expected row width
//! - **builder**: the SQL templates

mod builder;
mod params;
mod spec;

pub use builder::{
    ids, QueryBuilder, DEFAULT_FORECAST_WINDOW, DEFAULT_HIGH_SPENDER_THRESHOLD,
    DEFAULT_LOW_STOCK_LIMIT, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_RECENT_ORDERS,
    DEFAULT_TOP_CUSTOMERS, DEFAULT_TOP_PRODUCTS,
};
pub use params::{parse_non_negative, parse_timestamp, DateRange, FilterValue, MetricParams, MAX_LIMIT};
pub use spec::QuerySpec;
