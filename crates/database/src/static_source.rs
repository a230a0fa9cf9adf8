//! Static data source backed by fixed rows.
//!
//! Used by tests across the workspace in place of a live database. It records
//! every executed statement, can be switched into a failing mode, and returns
//! a configurable result for raw execution.

use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use maitred_core::data::{ContextRows, DataSource, MenuItem, OrderSummary, QueryResult, StaffMember};
use maitred_core::error::DatabaseError;

pub struct StaticDataSource {
    rows: RwLock<ContextRows>,
    query_result: RwLock<QueryResult>,
    failure: RwLock<Option<DatabaseError>>,
    executed: Mutex<Vec<String>>,
    fetches: Mutex<usize>,
}

impl StaticDataSource {
    pub fn new(rows: ContextRows) -> Self {
        Self {
            rows: RwLock::new(rows),
            query_result: RwLock::new(QueryResult::no_rows(0)),
            failure: RwLock::new(None),
            executed: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(ContextRows::default())
    }

    /// A small dining room: two dishes, two orders, one manager.
    pub fn sample() -> Self {
        Self::new(ContextRows {
            menu: vec![
                MenuItem {
                    name: "Margherita Pizza".into(),
                    price: Some(12.5),
                    category: Some("Pizza".into()),
                    description: Some("Tomato, mozzarella, basil".into()),
                },
                MenuItem {
                    name: "Tiramisu".into(),
                    price: Some(7.0),
                    category: Some("Dessert".into()),
                    description: None,
                },
            ],
            orders: vec![
                OrderSummary {
                    id: "2".into(),
                    customer_name: Some("Ana".into()),
                    table_number: Some("4".into()),
                    total: Some(19.5),
                    status: Some("Pending".into()),
                },
                OrderSummary {
                    id: "1".into(),
                    customer_name: Some("Ben".into()),
                    table_number: None,
                    total: Some(12.5),
                    status: Some("Served".into()),
                },
            ],
            users: vec![StaffMember {
                id: "7".into(),
                name: Some("Carla".into()),
                role: Some("manager".into()),
            }],
        })
    }

    /// Replace the rows returned by subsequent fetches.
    pub fn set_rows(&self, rows: ContextRows) {
        if let Ok(mut guard) = self.rows.write() {
            *guard = rows;
        }
    }

    /// Set the result returned by [`DataSource::execute`].
    pub fn set_query_result(&self, result: QueryResult) {
        if let Ok(mut guard) = self.query_result.write() {
            *guard = result;
        }
    }

    /// Make every subsequent call fail with `error`.
    pub fn fail_with(&self, error: DatabaseError) {
        if let Ok(mut guard) = self.failure.write() {
            *guard = Some(error);
        }
    }

    /// Clear a previously set failure.
    pub fn recover(&self) {
        if let Ok(mut guard) = self.failure.write() {
            *guard = None;
        }
    }

    /// Statements passed to `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of successful snapshot fetches.
    pub fn snapshot_count(&self) -> usize {
        self.fetches.lock().map(|g| *g).unwrap_or_default()
    }

    fn check(&self) -> Result<(), DatabaseError> {
        match self.failure.read() {
            Ok(guard) => match guard.as_ref() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            Err(_) => Err(DatabaseError::Query("static source poisoned".into())),
        }
    }

    fn rows(&self) -> Result<ContextRows, DatabaseError> {
        self.check()?;
        self.rows
            .read()
            .map(|g| g.clone())
            .map_err(|_| DatabaseError::Query("static source poisoned".into()))
    }
}

impl Default for StaticDataSource {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, DatabaseError> {
        Ok(self.rows()?.menu)
    }

    async fn fetch_recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, DatabaseError> {
        let mut orders = self.rows()?.orders;
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn fetch_users(&self) -> Result<Vec<StaffMember>, DatabaseError> {
        Ok(self.rows()?.users)
    }

    async fn snapshot(&self, order_limit: u32) -> Result<ContextRows, DatabaseError> {
        let mut rows = self.rows()?;
        rows.orders.truncate(order_limit as usize);
        if let Ok(mut count) = self.fetches.lock() {
            *count += 1;
        }
        Ok(rows)
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }
        self.check()?;
        self.query_result
            .read()
            .map(|g| g.clone())
            .map_err(|_| DatabaseError::Query("static source poisoned".into()))
    }

    async fn health_check(&self) -> Result<bool, DatabaseError> {
        self.check()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_respects_order_limit() {
        let source = StaticDataSource::sample();
        let rows = source.snapshot(1).await.unwrap();
        assert_eq!(rows.menu.len(), 2);
        assert_eq!(rows.orders.len(), 1);
        assert_eq!(rows.orders[0].id, "2");
        assert_eq!(source.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn failing_mode_and_recovery() {
        let source = StaticDataSource::sample();
        source.fail_with(DatabaseError::Connect("refused".into()));

        assert!(matches!(
            source.snapshot(10).await,
            Err(DatabaseError::Connect(_))
        ));
        assert!(source.fetch_menu().await.is_err());
        assert_eq!(source.snapshot_count(), 0);

        source.recover();
        assert!(source.snapshot(10).await.is_ok());
    }

    #[tokio::test]
    async fn execute_records_statements() {
        let source = StaticDataSource::empty();
        let result = source.execute("SELECT 1").await.unwrap();
        assert_eq!(result, QueryResult::no_rows(0));

        let mut row = serde_json::Map::new();
        row.insert("count".into(), serde_json::json!(3));
        source.set_query_result(QueryResult::Rows(vec![row]));
        let result = source.execute("SELECT count(*) FROM orders").await.unwrap();
        assert_eq!(result.row_count(), 1);

        assert_eq!(
            source.executed(),
            vec!["SELECT 1".to_string(), "SELECT count(*) FROM orders".to_string()]
        );
    }

    #[tokio::test]
    async fn execute_failure_still_recorded() {
        let source = StaticDataSource::empty();
        source.fail_with(DatabaseError::Query("syntax error".into()));
        assert!(source.execute("SELEC 1").await.is_err());
        assert_eq!(source.executed(), vec!["SELEC 1".to_string()]);
    }
}
