//! In-memory broker with scripted replies
//!
//! Replies are keyed by query id. Bodies go through the same response
//! parser as HTTP replies, so tests exercise the real envelope handling.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::client::{single_line, BrokerClient, BrokerFuture};
use super::response::{parse_response, QueryResult};
use crate::error::BrokerError;
use crate::query::QuerySpec;

/// Scripted outcome for one query id
#[derive(Debug, Clone)]
pub enum Reply {
    /// Raw response body handed to the response parser
    Body(String),
    /// Fail with this error
    Fail(BrokerError),
    /// Never answer (simulates a hung connection)
    Hang,
}

impl Reply {
    /// Success body with the given rows
    pub fn rows(rows: serde_json::Value) -> Self {
        Reply::Body(serde_json::json!({ "resultTable": { "rows": rows } }).to_string())
    }

    /// Success body with zero rows
    pub fn no_rows() -> Self {
        Reply::rows(serde_json::json!([]))
    }
}

#[derive(Debug, Clone)]
struct Script {
    reply: Reply,
    delay: Duration,
}

/// Broker that answers from a script instead of the network
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    scripts: Arc<Mutex<HashMap<&'static str, Script>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply for `query_id`
    pub fn with_reply(self, query_id: &'static str, reply: Reply) -> Self {
        self.with_delayed_reply(query_id, reply, Duration::ZERO)
    }

    /// Script the reply for `query_id`, delivered after `delay`
    pub fn with_delayed_reply(self, query_id: &'static str, reply: Reply, delay: Duration) -> Self {
        self.scripts.lock().insert(query_id, Script { reply, delay });
        self
    }

    /// (query id, transmitted SQL) for every call, in arrival order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls currently waiting on their scripted reply
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, spec: &QuerySpec) -> Result<QueryResult, BrokerError> {
        self.calls
            .lock()
            .push((spec.id().to_string(), single_line(spec.sql())));

        let script = self.scripts.lock().get(spec.id()).cloned();
        let Some(script) = script else {
            return Err(BrokerError::QueryRejected {
                code: 404,
                message: format!("no scripted reply for '{}'", spec.id()),
            });
        };

        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.reply {
            Reply::Body(body) => parse_response(spec, &body),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending::<Result<QueryResult, BrokerError>>().await,
        }
    }
}

impl BrokerClient for InMemoryBroker {
    fn execute<'a>(&'a self, spec: &'a QuerySpec) -> BrokerFuture<'a> {
        Box::pin(self.answer(spec))
    }
}

/// Tracks concurrent calls; decrements on drop so cancelled calls count too
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        InFlight { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
