//! Broker client abstraction
//!
//! `BrokerClient` is the seam between the fan-out coordinator and whatever
//! answers SQL. Implementations:
//! - `HttpBroker`: SQL-over-HTTP against a Pinot-compatible broker
//! - `InMemoryBroker`: scripted replies for tests and local runs
//! - `SimulatedBroker`: seeded fault injection around another client

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::response::{parse_response, structured_error, QueryResult};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, ConfigError};
use crate::query::QuerySpec;

/// Query options sent with every statement
pub const QUERY_OPTIONS: &str = "useMultistageEngine=true";

/// Header carrying the tenant / database selector
pub const DATABASE_HEADER: &str = "database";

pub type BrokerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<QueryResult, BrokerError>> + Send + 'a>>;

/// Executes exactly one SQL statement.
///
/// Implementations hold no per-call mutable state and are shared across
/// concurrent calls.
pub trait BrokerClient: Send + Sync + 'static {
    /// Run `spec` and return its rows. No retries.
    fn execute<'a>(&'a self, spec: &'a QuerySpec) -> BrokerFuture<'a>;
}

/// Replace line breaks with spaces; the broker only accepts single-line SQL
pub fn single_line(sql: &str) -> String {
    sql.replace(['\r', '\n'], " ")
}

/// Wire body of a broker query
#[derive(Debug, Serialize)]
pub struct SqlRequest {
    pub sql: String,
    #[serde(rename = "queryOptions")]
    pub query_options: &'static str,
}

impl SqlRequest {
    pub fn new(sql: &str) -> Self {
        SqlRequest {
            sql: single_line(sql),
            query_options: QUERY_OPTIONS,
        }
    }
}

// ============================================================================
// HttpBroker - SQL over HTTP
// ============================================================================

/// Broker client over HTTP.
///
/// Holds one pooled `reqwest::Client`; cloning shares the pool.
#[derive(Clone)]
pub struct HttpBroker {
    url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBroker").field("url", &self.url).finish()
    }
}

impl HttpBroker {
    /// Build a client from injected configuration
    pub fn new(config: &BrokerConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.auth_token.trim()))
            .map_err(|_| ConfigError::Invalid {
                name: "auth_token",
                reason: "contains characters not allowed in a header".to_string(),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            DATABASE_HEADER,
            HeaderValue::from_str(&config.database).map_err(|_| ConfigError::Invalid {
                name: "database",
                reason: "contains characters not allowed in a header".to_string(),
            })?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()?;

        Ok(HttpBroker {
            url: config.broker_url.clone(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, spec: &QuerySpec) -> Result<QueryResult, BrokerError> {
        let request = SqlRequest::new(spec.sql());
        let started = Instant::now();
        debug!(query = spec.id(), sql = %request.sql, "sending broker query");

        // `.json()` sets Content-Type: application/json
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BrokerError::BrokerUnavailable(transport_reason(&e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            BrokerError::BrokerUnavailable(format!("failed to read response body: {}", e))
        })?;

        debug!(
            query = spec.id(),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "broker responded"
        );

        let result = classify(spec, status, &body);
        if let Err(e) = &result {
            warn!(query = spec.id(), kind = e.kind(), error = %e, "broker call failed");
        }
        result
    }
}

impl BrokerClient for HttpBroker {
    fn execute<'a>(&'a self, spec: &'a QuerySpec) -> BrokerFuture<'a> {
        Box::pin(self.send(spec))
    }
}

/// Map an HTTP status and body onto a result or a broker error
fn classify(spec: &QuerySpec, status: StatusCode, body: &str) -> Result<QueryResult, BrokerError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let message = envelope_message(body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("unauthorized").to_string()
        });
        return Err(BrokerError::Unauthorized {
            code: status.as_u16(),
            message,
        });
    }

    // Any other non-2xx is an outage, whatever the body says
    if !status.is_success() {
        let reason = match envelope_message(body) {
            Some(message) => format!("HTTP {}: {}", status, message),
            None => format!("HTTP {}", status),
        };
        return Err(BrokerError::BrokerUnavailable(reason));
    }

    parse_response(spec, body)
}

/// Non-empty message of a JSON error envelope
fn envelope_message(body: &str) -> Option<String> {
    match structured_error(body)? {
        BrokerError::Unauthorized { message, .. } | BrokerError::QueryRejected { message, .. } => {
            Some(message).filter(|m| !m.is_empty())
        }
        _ => None,
    }
}

fn transport_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> QuerySpec {
        QuerySpec::new("total_orders", "SELECT COUNT(*)\nFROM orders", 1)
    }

    #[test]
    fn test_single_line_strips_breaks() {
        assert_eq!(single_line("SELECT *\r\nFROM t\nWHERE x"), "SELECT *  FROM t WHERE x");
        assert!(!single_line("a\rb\nc").contains(['\r', '\n']));
    }

    #[test]
    fn test_sql_request_body() {
        let body = serde_json::to_value(SqlRequest::new("SELECT 1\nFROM t")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"sql": "SELECT 1 FROM t", "queryOptions": "useMultistageEngine=true"})
        );
    }

    #[test]
    fn test_classify_success() {
        let result = classify(&spec(), StatusCode::OK, r#"{"resultTable":{"rows":[["120"]]}}"#);
        assert_eq!(result.unwrap().len(), 1);
    }

    #[test]
    fn test_classify_http_forbidden() {
        let err = classify(&spec(), StatusCode::FORBIDDEN, "Forbidden").unwrap_err();
        assert!(matches!(err, BrokerError::Unauthorized { code: 403, .. }));
    }

    #[test]
    fn test_classify_envelope_on_ok_status() {
        let err = classify(&spec(), StatusCode::OK, r#"{"code":403,"error":"access denied"}"#)
            .unwrap_err();
        assert!(matches!(err, BrokerError::Unauthorized { code: 403, .. }));
    }

    #[test]
    fn test_classify_server_error_without_envelope() {
        let err = classify(&spec(), StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, BrokerError::BrokerUnavailable(_)));
    }

    #[test]
    fn test_classify_server_error_with_envelope() {
        let err = classify(
            &spec(),
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"code":503,"error":"no servers available"}"#,
        )
        .unwrap_err();
        match err {
            BrokerError::BrokerUnavailable(reason) => {
                assert!(reason.contains("503"), "{}", reason);
                assert!(reason.contains("no servers available"), "{}", reason);
            }
            other => panic!("expected BrokerUnavailable, got {:?}", other),
        }

        let err = classify(
            &spec(),
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"exceptions":[{"errorCode":150,"message":"SQLParsingError"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BrokerError::BrokerUnavailable(_)));
    }

    #[test]
    fn test_classify_forbidden_keeps_envelope_message() {
        let err = classify(&spec(), StatusCode::FORBIDDEN, r#"{"code":403,"error":"expired token"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            BrokerError::Unauthorized {
                code: 403,
                message: "expired token".to_string()
            }
        );
    }

    #[test]
    fn test_classify_ok_non_json_is_malformed() {
        let err = classify(&spec(), StatusCode::OK, "No Response").unwrap_err();
        assert!(matches!(err, BrokerError::MalformedResponse(_)));
    }

    #[test]
    fn test_new_rejects_header_breaking_token() {
        let config = BrokerConfig::new("http://localhost:1/query/sql", "bad\ntoken", "db");
        assert!(matches!(
            HttpBroker::new(&config),
            Err(ConfigError::Invalid { name: "auth_token", .. })
        ));
    }
}
