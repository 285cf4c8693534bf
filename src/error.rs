//! Error taxonomy for the query pipeline
//!
//! Two layers:
//! - `BrokerError`: everything that can go wrong talking to the broker
//! - `QueryError`: what a metric request returns to its caller
//!
//! Zero-row results are not errors anywhere in this crate.

use thiserror::Error;

use crate::pipeline::MetricKind;

/// Failure of a single broker call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// Credentials rejected (HTTP 401/403 or an error envelope with code 401/403)
    #[error("broker rejected credentials (code {code}): {message}")]
    Unauthorized { code: u16, message: String },

    /// Broker answered with a structured error envelope for any other reason
    #[error("broker rejected query (code {code}): {message}")]
    QueryRejected { code: i64, message: String },

    /// Connection refused, timeout, or a non-2xx status without an error envelope
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// 2xx response whose body could not be read as a result envelope
    #[error("malformed broker response: {0}")]
    MalformedResponse(String),
}

impl BrokerError {
    /// Short stable name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::Unauthorized { .. } => "unauthorized",
            BrokerError::QueryRejected { .. } => "query_rejected",
            BrokerError::BrokerUnavailable(_) => "broker_unavailable",
            BrokerError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Failure of a whole metric request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Caller-supplied parameter failed validation; nothing was sent
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// One of the request's broker calls failed
    #[error("query '{query_id}' failed: {source}")]
    Broker {
        query_id: String,
        #[source]
        source: BrokerError,
    },
}

impl QueryError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn broker(query_id: impl Into<String>, source: BrokerError) -> Self {
        QueryError::Broker {
            query_id: query_id.into(),
            source,
        }
    }

    /// The broker-level cause, if any
    pub fn broker_error(&self) -> Option<&BrokerError> {
        match self {
            QueryError::Broker { source, .. } => Some(source),
            QueryError::InvalidParameter { .. } => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::InvalidParameter { .. })
    }

    /// HTTP status the endpoint layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::InvalidParameter { .. } => 400,
            QueryError::Broker { .. } => 502,
        }
    }

    /// Message safe to show a dashboard user.
    ///
    /// Broker internals (SQL, tokens, envelopes) never appear here.
    pub fn public_message(&self, metric: MetricKind) -> String {
        match self {
            QueryError::InvalidParameter { .. } => self.to_string(),
            QueryError::Broker { .. } => format!("Failed to fetch {}", metric.description()),
        }
    }
}

/// Configuration loading failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_is_client_error() {
        let err = QueryError::invalid("start_date", "not an ISO-8601 timestamp");
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
        assert!(err
            .public_message(MetricKind::TopProducts)
            .contains("start_date"));
    }

    #[test]
    fn test_broker_error_message_is_generic() {
        let err = QueryError::broker(
            "orders_total",
            BrokerError::Unauthorized {
                code: 403,
                message: "token st-secret denied".to_string(),
            },
        );
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 502);

        let public = err.public_message(MetricKind::TotalOrders);
        assert_eq!(public, "Failed to fetch total orders");
        assert!(!public.contains("st-secret"));
    }

    #[test]
    fn test_broker_error_kinds_are_distinct() {
        let unauthorized = BrokerError::Unauthorized {
            code: 403,
            message: String::new(),
        };
        let unavailable = BrokerError::BrokerUnavailable("connection refused".to_string());
        assert_ne!(unauthorized.kind(), unavailable.kind());
        assert_eq!(
            BrokerError::MalformedResponse("x".to_string()).kind(),
            "malformed_response"
        );
    }
}
