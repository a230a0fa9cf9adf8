//! PostgreSQL data source.
//!
//! Implements [`DataSource`] with:
//! - Typed fetches for the three context tables via `sqlx`
//! - A raw execution path for generated SQL, run over the simple-query
//!   protocol so every column arrives as text and can be mapped to JSON
//!   without knowing the schema
//!
//! Connections come from a `PgPool`; a pooled connection goes back to the
//! pool when dropped, on success and error paths alike.
//!
//! # Expected tables
//!
//! ```sql
//! menu_items (name, price, category, description, available)
//! orders     (id, customer_name, table_number, total, status, created_at)
//! users      (id, name, role)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Either, Executor, PgConnection, PgExecutor, Row, TypeInfo};
use tracing::{debug, info, warn};

use maitred_core::data::{ContextRows, DataSource, MenuItem, OrderSummary, QueryResult, StaffMember};
use maitred_core::error::DatabaseError;

// Numeric and id columns are cast so decoding does not depend on the exact
// column types (NUMERIC, SERIAL, UUID, enums).
const MENU_SQL: &str = "SELECT name, price::float8 AS price, category::text AS category, description \
     FROM menu_items WHERE available = true";

const ORDERS_SQL: &str = "SELECT id::text AS id, customer_name, table_number::text AS table_number, \
     total::float8 AS total, status::text AS status \
     FROM orders ORDER BY created_at DESC LIMIT $1";

const USERS_SQL: &str = "SELECT id::text AS id, name, role::text AS role FROM users";

/// PostgreSQL-backed restaurant data.
pub struct PostgresDataSource {
    pool: PgPool,
    /// Run raw statements inside a READ ONLY transaction that is rolled back.
    read_only_queries: bool,
}

impl PostgresDataSource {
    /// Build a lazily connecting pool from configuration.
    ///
    /// The server can start while the database is down; each request then
    /// reports the connection failure on its own.
    pub fn from_config(config: &maitred_config::AppConfig) -> Result<Self, DatabaseError> {
        let options = connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect_lazy_with(options);

        info!(
            host = %config.database.host.as_deref().unwrap_or_default(),
            port = config.database.port,
            "PostgreSQL pool configured"
        );
        Ok(Self::from_pool(pool).with_read_only_queries(config.database.read_only_queries))
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            read_only_queries: true,
        }
    }

    pub fn with_read_only_queries(mut self, read_only: bool) -> Self {
        self.read_only_queries = read_only;
        self
    }
}

/// Connection options built field by field, so hosts and credentials need no
/// URL escaping.
fn connect_options(config: &maitred_config::AppConfig) -> Result<PgConnectOptions, DatabaseError> {
    let settings = config
        .database_settings()
        .map_err(|e| DatabaseError::Connect(e.to_string()))?;

    Ok(PgConnectOptions::new()
        .host(settings.host)
        .port(settings.port)
        .username(settings.user)
        .password(settings.password)
        .database(settings.name))
}

async fn query_menu<'c, E: PgExecutor<'c>>(executor: E) -> Result<Vec<MenuItem>, DatabaseError> {
    let rows = sqlx::query(MENU_SQL)
        .fetch_all(executor)
        .await
        .map_err(map_sqlx_error)?;
    rows.iter().map(row_to_menu_item).collect()
}

async fn query_orders<'c, E: PgExecutor<'c>>(
    executor: E,
    limit: u32,
) -> Result<Vec<OrderSummary>, DatabaseError> {
    let rows = sqlx::query(ORDERS_SQL)
        .bind(i64::from(limit))
        .fetch_all(executor)
        .await
        .map_err(map_sqlx_error)?;
    rows.iter().map(row_to_order).collect()
}

async fn query_users<'c, E: PgExecutor<'c>>(executor: E) -> Result<Vec<StaffMember>, DatabaseError> {
    let rows = sqlx::query(USERS_SQL)
        .fetch_all(executor)
        .await
        .map_err(map_sqlx_error)?;
    rows.iter().map(row_to_staff).collect()
}

/// Run one raw statement and collect rows or the affected-row count.
async fn run_raw(conn: &mut PgConnection, sql: &str) -> Result<QueryResult, DatabaseError> {
    let mut stream = conn.fetch_many(sqlx::raw_sql(sql));
    let mut rows = Vec::new();
    let mut rows_affected = 0;

    while let Some(step) = stream.try_next().await.map_err(map_sqlx_error)? {
        match step {
            Either::Left(done) => rows_affected += done.rows_affected(),
            Either::Right(row) => rows.push(row_to_json(&row)?),
        }
    }

    if rows.is_empty() {
        Ok(QueryResult::no_rows(rows_affected))
    } else {
        Ok(QueryResult::Rows(rows))
    }
}

fn map_sqlx_error(e: sqlx::Error) -> DatabaseError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => DatabaseError::Connect(e.to_string()),
        sqlx::Error::ColumnDecode { index, source } => DatabaseError::Decode {
            column: index,
            reason: source.to_string(),
        },
        other => DatabaseError::Query(other.to_string()),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DatabaseError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| DatabaseError::Decode {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

fn row_to_menu_item(row: &PgRow) -> Result<MenuItem, DatabaseError> {
    Ok(MenuItem {
        name: get(row, "name")?,
        price: get(row, "price")?,
        category: get(row, "category")?,
        description: get(row, "description")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<OrderSummary, DatabaseError> {
    Ok(OrderSummary {
        id: get(row, "id")?,
        customer_name: get(row, "customer_name")?,
        table_number: get(row, "table_number")?,
        total: get(row, "total")?,
        status: get(row, "status")?,
    })
}

fn row_to_staff(row: &PgRow) -> Result<StaffMember, DatabaseError> {
    Ok(StaffMember {
        id: get(row, "id")?,
        name: get(row, "name")?,
        role: get(row, "role")?,
    })
}

/// Convert a text-format row into a JSON object keyed by column name.
fn row_to_json(row: &PgRow) -> Result<serde_json::Map<String, serde_json::Value>, DatabaseError> {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let text: Option<String> =
            row.try_get_unchecked(column.ordinal())
                .map_err(|e| DatabaseError::Decode {
                    column: column.name().to_string(),
                    reason: e.to_string(),
                })?;
        let value = match text {
            Some(text) => text_to_json(column.type_info().name(), text),
            None => serde_json::Value::Null,
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// Map a Postgres text-format value to JSON by its type name.
fn text_to_json(type_name: &str, text: String) -> serde_json::Value {
    use serde_json::Value;

    match type_name {
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "BOOL" => match text.as_str() {
            "t" | "true" => Value::Bool(true),
            "f" | "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        "JSON" | "JSONB" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

#[async_trait]
impl DataSource for PostgresDataSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, DatabaseError> {
        query_menu(&self.pool).await
    }

    async fn fetch_recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, DatabaseError> {
        query_orders(&self.pool, limit).await
    }

    async fn fetch_users(&self) -> Result<Vec<StaffMember>, DatabaseError> {
        query_users(&self.pool).await
    }

    async fn snapshot(&self, order_limit: u32) -> Result<ContextRows, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let rows = ContextRows {
            menu: query_menu(&mut *conn).await?,
            orders: query_orders(&mut *conn, order_limit).await?,
            users: query_users(&mut *conn).await?,
        };

        debug!(
            menu = rows.menu.len(),
            orders = rows.orders.len(),
            users = rows.users.len(),
            "Fetched context snapshot"
        );
        Ok(rows)
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        if self.read_only_queries {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let outcome = run_raw(&mut *tx, sql).await;

        let finished = if self.read_only_queries || outcome.is_err() {
            tx.rollback().await
        } else {
            tx.commit().await
        };
        if let Err(e) = finished {
            warn!(error = %e, "Failed to close query transaction");
        }

        let result = outcome?;
        debug!(rows = result.row_count(), "Executed generated statement");
        Ok(result)
    }

    async fn health_check(&self) -> Result<bool, DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(true)
    }
}

// ── Unit tests (no DB required) ──────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_become_numbers() {
        assert_eq!(text_to_json("INT4", "42".into()), json!(42));
        assert_eq!(text_to_json("INT8", "-7".into()), json!(-7));
    }

    #[test]
    fn numerics_become_floats() {
        assert_eq!(text_to_json("NUMERIC", "12.50".into()), json!(12.5));
        assert_eq!(text_to_json("FLOAT8", "0.1".into()), json!(0.1));
    }

    #[test]
    fn non_finite_numeric_stays_text() {
        assert_eq!(text_to_json("NUMERIC", "NaN".into()), json!("NaN"));
    }

    #[test]
    fn booleans_from_text_format() {
        assert_eq!(text_to_json("BOOL", "t".into()), json!(true));
        assert_eq!(text_to_json("BOOL", "f".into()), json!(false));
    }

    #[test]
    fn json_columns_are_parsed() {
        assert_eq!(
            text_to_json("JSONB", r#"{"spicy": true}"#.into()),
            json!({"spicy": true})
        );
        assert_eq!(text_to_json("JSON", "not json".into()), json!("not json"));
    }

    #[test]
    fn other_types_stay_strings() {
        assert_eq!(
            text_to_json("TIMESTAMPTZ", "2024-05-01 12:00:00+00".into()),
            json!("2024-05-01 12:00:00+00")
        );
        assert_eq!(text_to_json("TEXT", "Pending".into()), json!("Pending"));
    }

    #[test]
    fn fixed_queries_cast_volatile_columns() {
        assert!(MENU_SQL.contains("price::float8"));
        assert!(MENU_SQL.contains("available = true"));
        assert!(ORDERS_SQL.contains("ORDER BY created_at DESC LIMIT $1"));
        assert!(USERS_SQL.contains("id::text"));
    }

    #[test]
    fn pool_errors_map_to_connect() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            DatabaseError::Connect(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            DatabaseError::Query(_)
        ));
    }

    fn configured(pairs: &[(&str, &str)]) -> maitred_config::AppConfig {
        let mut config = maitred_config::AppConfig::default();
        config
            .apply_env(|key| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            })
            .unwrap();
        config
    }

    #[test]
    fn connect_options_accept_ipv6_host_and_raw_credentials() {
        let config = configured(&[
            ("DB_HOST", "::1"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "restaurant"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "p@ss/word:1"),
        ]);
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "::1");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("restaurant"));
    }

    #[tokio::test]
    async fn from_config_with_ipv6_host_builds_lazy_pool() {
        let config = configured(&[
            ("DB_HOST", "::1"),
            ("DB_NAME", "restaurant"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "pw"),
        ]);
        let source = PostgresDataSource::from_config(&config).unwrap();
        assert!(source.read_only_queries);
    }

    #[tokio::test]
    async fn from_config_without_settings_fails() {
        let config = maitred_config::AppConfig::default();
        assert!(matches!(
            PostgresDataSource::from_config(&config),
            Err(DatabaseError::Connect(_))
        ));
    }
}
