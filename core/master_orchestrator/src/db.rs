//! Pooled connection to the tenant-scoped finance schema (`users`,
//! `accounts`, `transactions`, `holdings_current`, `goals`, `budgets`, ...).
//!
//! Distinct from [`crate::memory_service`], which owns the orchestrator's
//! own session-memory/LLM-health bookkeeping database. This pool is what the
//! SQL Agent's executor, the Profile Pack Builder, and the Entity Resolver
//! query against -- always under a `user_id` filter.

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde_json::Value;
use shared_types::{CoreError, CoreResult, ExecutionResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task;

type DbPool = r2d2::Pool<SqliteConnectionManager>;

fn db_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::SqlExecutionFailed {
        message: e.to_string(),
    }
}

#[derive(Clone)]
pub struct FinanceDb {
    pool: DbPool,
}

impl FinanceDb {
    pub fn new(db_path: &str) -> CoreResult<Self> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = r2d2::Pool::builder()
            .max_size(10)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Applies a raw multi-statement script. Only used to seed schemas in
    /// tests that need a `FinanceDb` across module boundaries; production
    /// code always connects to an already-migrated database.
    #[cfg(test)]
    pub fn seed_schema(&self, script: &str) {
        let conn = self.pool.get().unwrap();
        conn.execute_batch(script).unwrap();
    }

    /// Executes a parameterized, already-sanitized `SELECT`/`WITH` query and
    /// returns its rows in the wire shape the modeling engine consumes.
    /// `params` keys are bound as SQLite named parameters (`:name`).
    pub async fn execute_query(
        &self,
        sql: &str,
        params: HashMap<String, Value>,
    ) -> CoreResult<ExecutionResult> {
        let pool = self.pool.clone();
        let sql = sql.to_string();
        let started = Instant::now();

        let (columns, rows) = task::spawn_blocking(move || -> CoreResult<(Vec<String>, Vec<Vec<Value>>)> {
            let conn = pool.get().map_err(db_err)?;
            let mut stmt = conn.prepare(&sql).map_err(db_err)?;

            let column_names: Vec<String> =
                stmt.column_names().iter().map(|s| s.to_string()).collect();

            let bound: Vec<(String, Box<dyn rusqlite::ToSql>)> = params
                .iter()
                .map(|(k, v)| {
                    let name = format!(":{}", k.trim_start_matches(':'));
                    let boxed: Box<dyn rusqlite::ToSql> = json_to_sql(v);
                    (name, boxed)
                })
                .collect();
            let bound_refs: Vec<(&str, &dyn rusqlite::ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_ref()))
                .collect();

            let mut rows_out = Vec::new();
            let mut query = stmt
                .query(bound_refs.as_slice())
                .map_err(db_err)?;
            while let Some(row) = query.next().map_err(db_err)? {
                rows_out.push(row_to_values(row, column_names.len())?);
            }
            Ok((column_names, rows_out))
        })
        .await
        .map_err(|e| db_err(e))??;

        let row_count = rows.len();
        Ok(ExecutionResult {
            columns,
            rows,
            row_count,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Distinct merchant names the user has transacted with, used by the
    /// Entity Resolver as its candidate pool. Bounded to keep the resolver
    /// cheap even for users with years of history.
    pub async fn distinct_merchants(&self, user_id: &str) -> CoreResult<Vec<String>> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        task::spawn_blocking(move || -> CoreResult<Vec<String>> {
            let conn = pool.get().map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT merchant_name FROM transactions \
                     WHERE user_id = ?1 AND merchant_name IS NOT NULL LIMIT 2000",
                )
                .map_err(db_err)?;
            let names = stmt
                .query_map([&user_id], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .filter_map(Result::ok)
                .collect();
            Ok(names)
        })
        .await
        .map_err(|e| db_err(e))?
    }
}

fn json_to_sql(value: &Value) -> Box<dyn rusqlite::ToSql> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Box::new(i)
            } else {
                Box::new(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

fn row_to_values(row: &Row, num_columns: usize) -> CoreResult<Vec<Value>> {
    let mut values = Vec::with_capacity(num_columns);
    for idx in 0..num_columns {
        let value = match row.get_ref(idx).map_err(db_err)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(_) => Value::Null,
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> FinanceDb {
        let db = FinanceDb::new(":memory:").unwrap();
        let conn = db.pool.get().unwrap();
        conn.execute_batch(
            "CREATE TABLE transactions (
                user_id TEXT NOT NULL,
                merchant_name TEXT,
                amount REAL NOT NULL,
                pending INTEGER NOT NULL
            );
            INSERT INTO transactions VALUES ('u1', 'Trader Joes', -42.25, 0);
            INSERT INTO transactions VALUES ('u1', 'Trader Joes', -42.25, 1);
            INSERT INTO transactions VALUES ('u2', 'Other Store', -10.0, 0);",
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn execute_query_binds_named_params_and_returns_rows() {
        let db = seeded_db();
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), Value::String("u1".to_string()));
        let result = db
            .execute_query(
                "SELECT merchant_name, amount FROM transactions WHERE user_id = :user_id AND pending = 0",
                params,
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.columns, vec!["merchant_name", "amount"]);
    }

    #[tokio::test]
    async fn distinct_merchants_is_scoped_to_user() {
        let db = seeded_db();
        let merchants = db.distinct_merchants("u1").await.unwrap();
        assert_eq!(merchants, vec!["Trader Joes".to_string()]);
    }
}
