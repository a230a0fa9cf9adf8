//! Security checks for Maitred.
//!
//! Provides:
//! - **SQL guard**: only single, read-only statements over allow-listed
//!   tables reach the database from the natural-language query path

pub mod sql_guard;

pub use sql_guard::{SqlGuard, SqlRejection};
