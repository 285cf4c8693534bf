//! A single SQL statement and the shape it is expected to return

/// One statement of a metric request.
///
/// Built fresh for every request by the query builder and dropped with it.
/// `columns` is the exact row width the response must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    id: &'static str,
    sql: String,
    columns: usize,
}

impl QuerySpec {
    /// Create a spec from already-validated SQL text.
    ///
    /// Callers outside the builder should only pass constant SQL here;
    /// caller-supplied values go through `query::params` first.
    pub fn new(id: &'static str, sql: impl Into<String>, columns: usize) -> Self {
        QuerySpec {
            id,
            sql: sql.into(),
            columns,
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}
