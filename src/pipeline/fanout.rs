//! Concurrent dispatch of a request's statements
//!
//! All statements of one metric request go out at once and are joined
//! all-or-nothing: the first failure fails the request and drops the
//! calls still in flight. The whole join is bounded by an overall timeout.

use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::broker::{BrokerClient, QueryResult, RawRow};
use crate::error::{BrokerError, QueryError};
use crate::query::QuerySpec;

/// Results of one fan-out, addressable by query id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    results: Vec<QueryResult>,
}

impl ResultSet {
    pub fn new(results: Vec<QueryResult>) -> Self {
        ResultSet { results }
    }

    pub fn get(&self, query_id: &str) -> Option<&QueryResult> {
        self.results.iter().find(|r| r.query_id() == query_id)
    }

    /// Rows for `query_id`; empty when the query returned nothing or was not run
    pub fn rows(&self, query_id: &str) -> &[RawRow] {
        self.get(query_id).map(QueryResult::rows).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Runs independent statements against a shared broker
pub struct FanOut<B: BrokerClient + ?Sized> {
    broker: Arc<B>,
    overall_timeout: Duration,
}

impl<B: BrokerClient + ?Sized> Clone for FanOut<B> {
    fn clone(&self) -> Self {
        FanOut {
            broker: self.broker.clone(),
            overall_timeout: self.overall_timeout,
        }
    }
}

impl<B: BrokerClient + ?Sized> FanOut<B> {
    pub fn new(broker: Arc<B>, overall_timeout: Duration) -> Self {
        FanOut {
            broker,
            overall_timeout,
        }
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    pub fn overall_timeout(&self) -> Duration {
        self.overall_timeout
    }

    /// Execute every spec concurrently; succeed only if all succeed
    pub async fn run(&self, specs: &[QuerySpec]) -> Result<ResultSet, QueryError> {
        let mut seen = HashSet::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.id()) {
                return Err(QueryError::invalid(
                    "query_id",
                    format!("duplicate query id '{}' in one request", spec.id()),
                ));
            }
        }

        if specs.is_empty() {
            return Ok(ResultSet::default());
        }

        let started = Instant::now();
        debug!(width = specs.len(), "fan-out started");

        // One flag per spec, set when its answer arrives
        let answered: Vec<AtomicBool> = specs.iter().map(|_| AtomicBool::new(false)).collect();

        let calls = specs.iter().zip(&answered).map(|(spec, answered)| {
            let broker = &self.broker;
            async move {
                let result = broker
                    .execute(spec)
                    .await
                    .map_err(|e| QueryError::broker(spec.id(), e))?;
                answered.store(true, Ordering::Relaxed);
                Ok::<_, QueryError>(result)
            }
        });

        let outcome = match tokio::time::timeout(self.overall_timeout, try_join_all(calls)).await {
            Ok(joined) => joined,
            Err(_) => Err(QueryError::broker(
                pending_ids(specs, &answered),
                BrokerError::BrokerUnavailable(format!(
                    "no complete answer within {} ms",
                    self.overall_timeout.as_millis()
                )),
            )),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(results) => {
                debug!(width = specs.len(), elapsed_ms, "fan-out complete");
                Ok(ResultSet::new(results))
            }
            Err(err) => {
                warn!(width = specs.len(), elapsed_ms, error = %err, "fan-out failed");
                Err(err)
            }
        }
    }
}

/// Comma-joined ids of the specs that never answered
fn pending_ids(specs: &[QuerySpec], answered: &[AtomicBool]) -> String {
    specs
        .iter()
        .zip(answered)
        .filter(|(_, answered)| !answered.load(Ordering::Relaxed))
        .map(|(spec, _)| spec.id())
        .collect::<Vec<_>>()
        .join(",")
}
