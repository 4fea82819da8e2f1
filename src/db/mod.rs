//! Thin rqlite client.
//!
//! rqlite speaks JSON over HTTP: parameterized statements are posted as
//! `[["sql", param, ...], ...]` arrays to `/db/execute` (writes) or
//! `/db/query` (reads). The harness only uses this to seed and tear down
//! test fixtures, so the client stays minimal: round-robin over the cluster
//! hosts, fail over to the next host on a transport error.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use serde_json::Value;

use crate::error::HarnessError;

/// One parameterized SQL statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// rqlite wire form: a JSON array with the SQL first, parameters after.
    fn to_wire(&self) -> Value {
        let mut arr = Vec::with_capacity(self.params.len() + 1);
        arr.push(Value::String(self.sql.clone()));
        arr.extend(self.params.iter().cloned());
        Value::Array(arr)
    }
}

/// Outcome of a single statement within a request.
#[derive(Debug, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub values: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub rows_affected: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    results: Vec<StatementResult>,
}

/// Client for an rqlite cluster.
pub struct RqliteClient {
    http: reqwest::Client,
    hosts: Vec<String>,
    next_host: AtomicUsize,
}

impl RqliteClient {
    /// Build a client from `RQLITE_IPS`-style entries. Bare hosts get the
    /// default rqlite scheme and port.
    pub fn new(hosts: Vec<String>) -> Self {
        let hosts = hosts.into_iter().map(|h| normalize_host(&h)).collect();
        Self {
            http: reqwest::Client::new(),
            hosts,
            next_host: AtomicUsize::new(0),
        }
    }

    /// Execute a single write statement.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<StatementResult, HarnessError> {
        let mut results = self
            .post("/db/execute", &[Statement::new(sql, params)])
            .await?;
        Ok(results.remove(0))
    }

    /// Execute several write statements in one transaction.
    pub async fn execute_many(&self, statements: &[Statement]) -> Result<Vec<StatementResult>, HarnessError> {
        self.post("/db/execute?transaction", statements).await
    }

    /// Run a read statement and return its rows.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<StatementResult, HarnessError> {
        let mut results = self
            .post("/db/query?level=weak", &[Statement::new(sql, params)])
            .await?;
        Ok(results.remove(0))
    }

    async fn post(&self, path: &str, statements: &[Statement]) -> Result<Vec<StatementResult>, HarnessError> {
        let body: Vec<Value> = statements.iter().map(Statement::to_wire).collect();
        let start = self.next_host.fetch_add(1, Ordering::Relaxed);
        let mut last_error = String::from("no hosts configured");

        for offset in 0..self.hosts.len() {
            let host = &self.hosts[(start + offset) % self.hosts.len()];
            let response = match self
                .http
                .post(format!("{host}{path}"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "rqlite host unreachable, trying next");
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(HarnessError::Database(format!(
                    "{path} returned status {status}: {text}"
                )));
            }
            let parsed: ResponseBody = serde_json::from_str(&text)?;
            if parsed.results.len() != statements.len() {
                return Err(HarnessError::Database(format!(
                    "expected {} results, got {}",
                    statements.len(),
                    parsed.results.len()
                )));
            }
            for result in &parsed.results {
                if let Some(error) = &result.error {
                    return Err(HarnessError::Database(error.clone()));
                }
            }
            return Ok(parsed.results);
        }

        Err(HarnessError::DatabaseUnavailable(last_error))
    }
}

fn normalize_host(host: &str) -> String {
    if host.contains("://") {
        host.trim_end_matches('/').to_string()
    } else if host.contains(':') {
        format!("http://{host}")
    } else {
        format!("http://{host}:4001")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statement_wire_form_puts_sql_first() {
        let stmt = Statement::new("INSERT INTO users (sub) VALUES (?)", vec![json!("s")]);
        assert_eq!(
            stmt.to_wire(),
            json!(["INSERT INTO users (sub) VALUES (?)", "s"])
        );
    }

    #[test]
    fn bare_hosts_get_scheme_and_port() {
        assert_eq!(normalize_host("10.0.0.3"), "http://10.0.0.3:4001");
        assert_eq!(normalize_host("10.0.0.3:4201"), "http://10.0.0.3:4201");
        assert_eq!(normalize_host("https://db.internal/"), "https://db.internal");
    }
}
