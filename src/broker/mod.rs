//! Broker access
//!
//! Everything between a built `QuerySpec` and a parsed `QueryResult`:
//! - **TypedValue**: one result cell, uninterpreted
//! - **Response parsing**: success, structured error and empty envelopes
//! - **Clients**: HTTP, in-memory and fault-injecting implementations

mod client;
mod memory;
mod response;
mod simulated;
mod value;

pub use client::{
    single_line, BrokerClient, BrokerFuture, HttpBroker, SqlRequest, DATABASE_HEADER,
    QUERY_OPTIONS,
};
pub use memory::{InMemoryBroker, Reply};
pub use response::{parse_response, structured_error, QueryResult, RawRow};
pub use simulated::{SimulatedBroker, SimulatedBrokerConfig, SimulatedBrokerStats};
pub use value::TypedValue;
