//! DataSource trait — read access to the restaurant database.
//!
//! Three fixed row-sets feed the context prompt (menu, recent orders, users).
//! A separate raw execution path runs model-generated SQL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// An available item on the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A recent order, newest first when fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A row from the `users` table (staff accounts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// The three row-sets a context snapshot is rendered from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRows {
    pub menu: Vec<MenuItem>,
    pub orders: Vec<OrderSummary>,
    pub users: Vec<StaffMember>,
}

/// Outcome of running a raw statement.
///
/// Serializes untagged: a JSON array of row objects, or a status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows(Vec<serde_json::Map<String, serde_json::Value>>),
    Status(String),
}

impl QueryResult {
    /// Status reported when a statement produced no rows.
    pub fn no_rows(rows_affected: u64) -> Self {
        if rows_affected == 0 {
            QueryResult::Status("Query executed successfully, no rows returned.".into())
        } else {
            QueryResult::Status(format!("{rows_affected} row(s) affected."))
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows(rows) => rows.len(),
            QueryResult::Status(_) => 0,
        }
    }
}

/// The core DataSource trait.
///
/// Implementations: PostgreSQL (production), static rows (tests).
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The backend name (e.g., "postgres", "static").
    fn name(&self) -> &str;

    /// Available menu items.
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, DatabaseError>;

    /// The `limit` most recent orders, newest first.
    async fn fetch_recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, DatabaseError>;

    /// All users.
    async fn fetch_users(&self) -> Result<Vec<StaffMember>, DatabaseError>;

    /// Fetch all three row-sets. Any failure aborts the snapshot.
    async fn snapshot(&self, order_limit: u32) -> Result<ContextRows, DatabaseError> {
        Ok(ContextRows {
            menu: self.fetch_menu().await?,
            orders: self.fetch_recent_orders(order_limit).await?,
            users: self.fetch_users().await?,
        })
    }

    /// Run a raw statement and return its rows, or a status when it produced none.
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError>;

    /// Health check — can we reach the database?
    async fn health_check(&self) -> Result<bool, DatabaseError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_result_serializes_untagged() {
        let status = QueryResult::no_rows(0);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!("Query executed successfully, no rows returned.")
        );

        let mut row = serde_json::Map::new();
        row.insert("name".into(), serde_json::json!("Soup"));
        let rows = QueryResult::Rows(vec![row]);
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            serde_json::json!([{"name": "Soup"}])
        );
        assert_eq!(rows.row_count(), 1);
    }

    #[test]
    fn affected_rows_status() {
        assert_eq!(
            QueryResult::no_rows(3),
            QueryResult::Status("3 row(s) affected.".into())
        );
    }

    #[test]
    fn menu_item_optional_fields_default() {
        let item: MenuItem = serde_json::from_str(r#"{"name":"Tea"}"#).unwrap();
        assert!(item.price.is_none());
        assert!(item.description.is_none());
    }
}
