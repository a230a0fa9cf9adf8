//! # Maitred Database
//!
//! Restaurant data access behind the [`DataSource`](maitred_core::DataSource) trait.
//!
//! Backends:
//! - **PostgreSQL** — production store (`PostgresDataSource`)
//! - **Static** — fixed rows for tests (`StaticDataSource`)

pub mod postgres;
pub mod static_source;

pub use postgres::PostgresDataSource;
pub use static_source::StaticDataSource;
