//! Database operations for the storefront `PostgreSQL` database.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `users` - Customer and back-office accounts
//! - `items` - Catalogue
//! - `inventory` - Stock and visibility, at most one row per item
//! - `inventory_log` - Per-field audit history (outlives deleted items)
//! - `cart` - Persistent carts of logged-in users
//! - `orders` / `ordered_items` - Fulfilled purchases with frozen line items
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Conventions
//!
//! Repositories borrow the pool and serve reads and single-statement writes.
//! Multi-statement mutations run in a transaction owned by a service; the
//! `*_tx` helpers in each module take the transaction's connection.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p fnuc-cli -- migrate
//! ```

pub mod carts;
pub mod dashboard;
pub mod inventory;
pub mod items;
pub mod orders;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use dashboard::{DashboardRepository, DashboardSummary};
pub use inventory::InventoryRepository;
pub use items::ItemRepository;
pub use orders::OrderRepository;
pub use users::UserRepository;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
