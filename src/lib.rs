//! Dashboard metric queries over a SQL-over-HTTP broker
//!
//! Every dashboard metric runs through one pipeline:
//! parameters are validated, SQL is built from fixed templates, the
//! statements go to the broker concurrently, and the joined rows are
//! turned into typed values with zero-fallback rules.
//!
//! ```no_run
//! use databin_query::{BrokerConfig, Dashboard, MetricKind, MetricParams};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let dashboard = Dashboard::from_config(&BrokerConfig::from_env()?)?;
//! let params = MetricParams::from_pairs([("start_date", "2024-01-01"), ("end_date", "2024-01-31")])?;
//! let response = dashboard.compute(MetricKind::TopProducts, &params).await?;
//! println!("{}", response.to_json());
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod calc;
pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod query;

pub use broker::{BrokerClient, HttpBroker, InMemoryBroker, QueryResult, RawRow, TypedValue};
pub use calc::{DerivedMetric, DerivedValue, Format, MetricResponse};
pub use config::BrokerConfig;
pub use error::{BrokerError, ConfigError, QueryError};
pub use pipeline::{Dashboard, FanOut, MetricKind, MetricRequest, ResultSet};
pub use query::{DateRange, FilterValue, MetricParams, QueryBuilder, QuerySpec};
