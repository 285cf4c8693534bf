//! Simulated Broker with Fault Injection
//!
//! Wraps another `BrokerClient` and injects latency and failures from a
//! seeded RNG, so a given seed always produces the same fault schedule.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;

use super::client::{BrokerClient, BrokerFuture};
use super::response::QueryResult;
use crate::error::BrokerError;
use crate::query::QuerySpec;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedBrokerConfig {
    /// Probability of a transport failure
    pub unavailable_prob: f64,
    /// Probability of a credentials rejection
    pub unauthorized_prob: f64,
    /// Probability of an unreadable success body
    pub malformed_prob: f64,
    /// Simulated latency range in milliseconds (min, max)
    pub latency_range_ms: (u64, u64),
}

impl Default for SimulatedBrokerConfig {
    fn default() -> Self {
        SimulatedBrokerConfig {
            unavailable_prob: 0.01,
            unauthorized_prob: 0.001,
            malformed_prob: 0.005,
            latency_range_ms: (1, 20),
        }
    }
}

impl SimulatedBrokerConfig {
    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedBrokerConfig {
            unavailable_prob: 0.0,
            unauthorized_prob: 0.0,
            malformed_prob: 0.0,
            latency_range_ms: (0, 0),
        }
    }

    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedBrokerConfig {
            unavailable_prob: 0.2,
            unauthorized_prob: 0.05,
            malformed_prob: 0.05,
            latency_range_ms: (0, 30),
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedBrokerStats {
    pub calls: u64,
    pub unavailable: u64,
    pub unauthorized: u64,
    pub malformed: u64,
}

impl SimulatedBrokerStats {
    pub fn injected_faults(&self) -> u64 {
        self.unavailable + self.unauthorized + self.malformed
    }
}

struct SimulatedInner {
    rng: ChaCha8Rng,
    stats: SimulatedBrokerStats,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Unavailable,
    Unauthorized,
    Malformed,
}

/// Broker wrapper that injects faults before delegating
#[derive(Clone)]
pub struct SimulatedBroker<B: BrokerClient> {
    inner: B,
    config: SimulatedBrokerConfig,
    state: Arc<Mutex<SimulatedInner>>,
}

impl<B: BrokerClient> SimulatedBroker<B> {
    pub fn new(inner: B, seed: u64, config: SimulatedBrokerConfig) -> Self {
        SimulatedBroker {
            inner,
            config,
            state: Arc::new(Mutex::new(SimulatedInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats: SimulatedBrokerStats::default(),
            })),
        }
    }

    pub fn stats(&self) -> SimulatedBrokerStats {
        self.state.lock().stats.clone()
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Draw latency and fault for one call; the lock is released before any await
    fn plan(&self) -> (Duration, Option<Fault>) {
        let mut state = self.state.lock();
        state.stats.calls += 1;

        let (min, max) = self.config.latency_range_ms;
        let latency = if max > min {
            Duration::from_millis(state.rng.gen_range(min..=max))
        } else {
            Duration::from_millis(min)
        };

        let roll: f64 = state.rng.gen();
        let unavailable = self.config.unavailable_prob;
        let unauthorized = unavailable + self.config.unauthorized_prob;
        let malformed = unauthorized + self.config.malformed_prob;

        let fault = if roll < unavailable {
            state.stats.unavailable += 1;
            Some(Fault::Unavailable)
        } else if roll < unauthorized {
            state.stats.unauthorized += 1;
            Some(Fault::Unauthorized)
        } else if roll < malformed {
            state.stats.malformed += 1;
            Some(Fault::Malformed)
        } else {
            None
        };

        (latency, fault)
    }

    async fn run(&self, spec: &QuerySpec) -> Result<QueryResult, BrokerError> {
        let (latency, fault) = self.plan();

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match fault {
            Some(Fault::Unavailable) => Err(BrokerError::BrokerUnavailable(
                "simulated: connection refused".to_string(),
            )),
            Some(Fault::Unauthorized) => Err(BrokerError::Unauthorized {
                code: 403,
                message: "simulated: access denied".to_string(),
            }),
            Some(Fault::Malformed) => Err(BrokerError::MalformedResponse(
                "simulated: truncated body".to_string(),
            )),
            None => self.inner.execute(spec).await,
        }
    }
}

impl<B: BrokerClient> BrokerClient for SimulatedBroker<B> {
    fn execute<'a>(&'a self, spec: &'a QuerySpec) -> BrokerFuture<'a> {
        Box::pin(self.run(spec))
    }
}
