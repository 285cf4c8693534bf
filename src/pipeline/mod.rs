//! Metric pipeline
//!
//! One generic path for every metric:
//!
//! ```text
//! MetricKind + MetricParams
//!     -> QueryBuilder      (validated SQL, 1..N QuerySpecs)
//!     -> FanOut            (concurrent broker calls, all-or-nothing)
//!     -> calc::derive      (zero-fallback calculators)
//!     -> MetricResponse
//! ```

mod fanout;
mod request;

pub use fanout::{FanOut, ResultSet};
pub use request::{MetricKind, MetricRequest};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::broker::{BrokerClient, HttpBroker};
use crate::calc::{self, MetricResponse};
use crate::config::BrokerConfig;
use crate::error::{ConfigError, QueryError};
use crate::query::{MetricParams, QueryBuilder};

/// Computes dashboard metrics against one broker.
///
/// Cheap to clone; clones share the broker and its connection pool.
#[derive(Clone)]
pub struct Dashboard {
    builder: QueryBuilder,
    fanout: FanOut<dyn BrokerClient>,
}

impl Dashboard {
    pub fn new(broker: Arc<dyn BrokerClient>, overall_timeout: Duration) -> Self {
        Dashboard {
            builder: QueryBuilder::new(),
            fanout: FanOut::new(broker, overall_timeout),
        }
    }

    /// HTTP broker built from validated configuration
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let broker = HttpBroker::new(config)?;
        info!(
            broker_url = %broker.url(),
            database = %config.database,
            overall_timeout_ms = config.overall_timeout.as_millis() as u64,
            "dashboard broker configured"
        );
        Ok(Self::new(Arc::new(broker), config.overall_timeout))
    }

    /// Build the statements for `kind` without running them
    pub fn plan(&self, kind: MetricKind, params: &MetricParams) -> Result<MetricRequest, QueryError> {
        self.builder.build(kind, params)
    }

    /// Build, dispatch and derive one metric
    pub async fn compute(
        &self,
        kind: MetricKind,
        params: &MetricParams,
    ) -> Result<MetricResponse, QueryError> {
        let started = Instant::now();

        let request = match self.plan(kind, params) {
            Ok(request) => request,
            Err(err) => {
                debug!(metric = %kind, error = %err, "metric request rejected");
                return Err(err);
            }
        };

        let results = match self.fanout.run(request.specs()).await {
            Ok(results) => results,
            Err(err) => {
                error!(metric = %kind, error = %err, "metric computation failed");
                return Err(err);
            }
        };

        let response = calc::derive(kind, &results);
        debug!(
            metric = %kind,
            queries = request.specs().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metric computed"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, Reply};
    use crate::calc::DerivedValue;
    use crate::query::ids;
    use serde_json::json;

    #[tokio::test]
    async fn test_compute_total_orders() {
        let broker = InMemoryBroker::new().with_reply(ids::TOTAL_ORDERS, Reply::rows(json!([["120"]])));
        let dashboard = Dashboard::new(Arc::new(broker), Duration::from_secs(1));

        let response = dashboard
            .compute(MetricKind::TotalOrders, &MetricParams::new())
            .await
            .unwrap();
        assert_eq!(response.get("total_orders"), Some(&DerivedValue::Integer(120)));
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_broker() {
        let broker = Arc::new(InMemoryBroker::new());
        let dashboard = Dashboard::new(broker.clone(), Duration::from_secs(1));

        let err = dashboard
            .compute(MetricKind::TopProducts, &MetricParams::new())
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(broker.call_count(), 0);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = BrokerConfig::new("ftp://broker", "token", "db");
        assert!(Dashboard::from_config(&config).is_err());
    }
}
