//! Broker response envelope parsing
//!
//! Turns a response body into a `QueryResult`. Pure: the same body and
//! spec always give the same answer.
//!
//! Envelope shapes handled:
//! - success: `{"resultTable": {"rows": [[...], ...]}, ...}`
//! - structured error: `{"code": 403, "error": "access denied"}`
//! - Pinot exceptions: `{"exceptions": [{"errorCode": 150, "message": "..."}]}`

use serde_json::Value as JsonValue;

use super::value::TypedValue;
use crate::error::BrokerError;
use crate::query::QuerySpec;

/// One result row; its length always equals the spec's column count
pub type RawRow = Vec<TypedValue>;

/// Rows returned for one `QuerySpec`. Zero rows is a valid result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    query_id: &'static str,
    rows: Vec<RawRow>,
}

impl QueryResult {
    pub fn new(query_id: &'static str, rows: Vec<RawRow>) -> Self {
        QueryResult { query_id, rows }
    }

    pub fn empty(query_id: &'static str) -> Self {
        QueryResult {
            query_id,
            rows: Vec::new(),
        }
    }

    pub fn query_id(&self) -> &'static str {
        self.query_id
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn first_row(&self) -> Option<&RawRow> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Parse a 2xx response body for `spec`
pub fn parse_response(spec: &QuerySpec, body: &str) -> Result<QueryResult, BrokerError> {
    let envelope: JsonValue = serde_json::from_str(body)
        .map_err(|e| BrokerError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    if !envelope.is_object() {
        return Err(BrokerError::MalformedResponse(
            "envelope is not a JSON object".to_string(),
        ));
    }

    if let Some(err) = envelope_error(&envelope) {
        return Err(err);
    }

    let rows = match envelope.pointer("/resultTable/rows") {
        Some(JsonValue::Array(rows)) => rows,
        // No table or no rows array: the query matched nothing
        _ => return Ok(QueryResult::empty(spec.id())),
    };

    let mut parsed = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            BrokerError::MalformedResponse(format!("row {} is not an array", index))
        })?;

        if cells.len() != spec.columns() {
            return Err(BrokerError::MalformedResponse(format!(
                "row {} has {} columns, expected {}",
                index,
                cells.len(),
                spec.columns()
            )));
        }

        parsed.push(cells.iter().map(TypedValue::from_json).collect());
    }

    Ok(QueryResult::new(spec.id(), parsed))
}

/// Structured error carried by a body, if the body is a JSON error envelope.
///
/// Used for non-2xx responses, where the body may or may not be JSON.
pub fn structured_error(body: &str) -> Option<BrokerError> {
    let envelope: JsonValue = serde_json::from_str(body).ok()?;
    envelope_error(&envelope)
}

fn envelope_error(envelope: &JsonValue) -> Option<BrokerError> {
    let code = envelope.get("code").and_then(JsonValue::as_i64);
    let error = envelope.get("error").filter(|e| !e.is_null());

    let is_error_code = code.is_some_and(|c| !(200..300).contains(&c));
    if error.is_some() || is_error_code {
        let message = error.map(message_text).unwrap_or_default();
        return Some(classify(code.unwrap_or(0), message));
    }

    if let Some(JsonValue::Array(exceptions)) = envelope.get("exceptions") {
        if let Some(first) = exceptions.first() {
            let code = first
                .get("errorCode")
                .and_then(JsonValue::as_i64)
                .unwrap_or(0);
            let message = first.get("message").map(message_text).unwrap_or_default();
            return Some(classify(code, message));
        }
    }

    None
}

fn classify(code: i64, message: String) -> BrokerError {
    match code {
        401 | 403 => BrokerError::Unauthorized {
            code: code as u16,
            message,
        },
        _ => BrokerError::QueryRejected { code, message },
    }
}

fn message_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(columns: usize) -> QuerySpec {
        QuerySpec::new("test_query", "SELECT 1", columns)
    }

    #[test]
    fn test_parse_success_rows() {
        let body = r#"{"resultTable":{"dataSchema":{},"rows":[["120"]]},"numDocsScanned":1}"#;
        let result = parse_response(&spec(1), body).unwrap();
        assert_eq!(result.query_id(), "test_query");
        assert_eq!(result.rows(), &[vec![TypedValue::Text("120".into())]]);
    }

    #[test]
    fn test_missing_table_is_empty_not_error() {
        let result = parse_response(&spec(2), r#"{"numDocsScanned":0}"#).unwrap();
        assert!(result.is_empty());

        let result = parse_response(&spec(2), r#"{"resultTable":{"rows":null}}"#).unwrap();
        assert!(result.is_empty());

        let result = parse_response(&spec(2), r#"{"resultTable":{"rows":"none"}}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_null_cells_preserved() {
        let body = r#"{"resultTable":{"rows":[[null,"x"]]}}"#;
        let result = parse_response(&spec(2), body).unwrap();
        assert_eq!(result.rows()[0][0], TypedValue::Null);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let body = r#"{"resultTable":{"rows":[["a","b"],["c"]]}}"#;
        let err = parse_response(&spec(2), body).unwrap_err();
        assert!(matches!(err, BrokerError::MalformedResponse(ref m) if m.contains("row 1")));
    }

    #[test]
    fn test_long_row_is_malformed() {
        let body = r#"{"resultTable":{"rows":[["a","b","c"]]}}"#;
        assert!(matches!(
            parse_response(&spec(2), body),
            Err(BrokerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_array_row_is_malformed() {
        let body = r#"{"resultTable":{"rows":["a"]}}"#;
        assert!(matches!(
            parse_response(&spec(1), body),
            Err(BrokerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_json_body_is_malformed() {
        assert!(matches!(
            parse_response(&spec(1), "<html>bad gateway</html>"),
            Err(BrokerError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&spec(1), "[1,2]"),
            Err(BrokerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_envelope_403_is_unauthorized() {
        let err = parse_response(&spec(1), r#"{"code":403,"error":"access denied"}"#).unwrap_err();
        assert_eq!(
            err,
            BrokerError::Unauthorized {
                code: 403,
                message: "access denied".to_string()
            }
        );
    }

    #[test]
    fn test_error_envelope_other_code_is_rejected() {
        let err = parse_response(&spec(1), r#"{"code":500,"error":"boom"}"#).unwrap_err();
        assert!(matches!(err, BrokerError::QueryRejected { code: 500, .. }));

        let err = parse_response(&spec(1), r#"{"error":"no code"}"#).unwrap_err();
        assert!(matches!(err, BrokerError::QueryRejected { code: 0, .. }));
    }

    #[test]
    fn test_pinot_exceptions_are_rejected() {
        let body = r#"{"exceptions":[{"errorCode":150,"message":"SQLParsingError"}],"resultTable":null}"#;
        let err = parse_response(&spec(1), body).unwrap_err();
        assert_eq!(
            err,
            BrokerError::QueryRejected {
                code: 150,
                message: "SQLParsingError".to_string()
            }
        );
    }

    #[test]
    fn test_empty_exceptions_and_success_code_are_not_errors() {
        let body = r#"{"exceptions":[],"code":200,"resultTable":{"rows":[]}}"#;
        assert!(parse_response(&spec(1), body).unwrap().is_empty());
    }

    #[test]
    fn test_structured_error_on_plain_text() {
        assert_eq!(structured_error("Service Unavailable"), None);
        assert!(structured_error(r#"{"code":401,"error":"expired"}"#).is_some());
    }
}
