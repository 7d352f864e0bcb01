//! Integration tests for the Fnuc storefront.
//!
//! The tests talk to a running storefront over HTTP and inspect its
//! `PostgreSQL` database directly. All of them are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations to a running PostgreSQL
//! cargo run -p fnuc-cli -- migrate
//!
//! # Start the storefront with an admin token
//! ADMIN_API_TOKEN=... cargo run -p fnuc-storefront
//!
//! # Run integration tests
//! cargo test -p fnuc-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `STOREFRONT_BASE_URL` - Storefront address (default: `http://localhost:3000`)
//! - `STOREFRONT_DATABASE_URL` or `DATABASE_URL` - Database the storefront uses
//! - `ADMIN_API_TOKEN` - Token configured on the storefront

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, Method, RequestBuilder, redirect};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use fnuc_core::ItemId;

/// Storefront address used when `STOREFRONT_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "Integration-Pass-42";

/// Failure while preparing or talking to the system under test.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Storefront address from the environment.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// A fresh email address that no other test run uses.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// A browser-like client: keeps cookies and does not follow redirects, so
/// tests can assert on `Location` headers.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub fn browser() -> Result<Client, ContextError> {
    Ok(Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()?)
}

/// Shared handles for one test.
pub struct TestContext {
    pub base_url: String,
    pub client: Client,
    pub pool: PgPool,
    admin_token: SecretString,
}

impl TestContext {
    /// Connect to the storefront database and read the admin token.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is unset or the database is
    /// unreachable.
    pub async fn new() -> Result<Self, ContextError> {
        let database_url = std::env::var("STOREFRONT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ContextError::MissingEnv("STOREFRONT_DATABASE_URL"))?;
        let admin_token = std::env::var("ADMIN_API_TOKEN")
            .map_err(|_| ContextError::MissingEnv("ADMIN_API_TOKEN"))?;

        Ok(Self {
            base_url: base_url(),
            client: browser()?,
            pool: PgPool::connect(&database_url).await?,
            admin_token: SecretString::from(admin_token),
        })
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A request carrying the admin bearer token.
    #[must_use]
    pub fn admin(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(self.admin_token.expose_secret())
    }

    /// Create an item through the admin API and return its JSON.
    ///
    /// # Errors
    ///
    /// Returns an error unless the API answers `201 Created`.
    pub async fn create_item(&self, name: &str, stock: i32) -> Result<Value, ContextError> {
        let response = self
            .admin(Method::POST, "/admin/api/items")
            .json(&serde_json::json!({
                "name": name,
                "price": "19.90",
                "category": "Integration",
                "details": "Created by the integration suite",
                "price_id": format!("price_{}", Uuid::new_v4().simple()),
                "stock_quantity": stock,
                "low_stock_threshold": 2,
            }))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(ContextError::Unexpected(format!(
                "creating {name} returned {status}"
            )));
        }
        Ok(response.json().await?)
    }

    /// Remove an item and its audit history directly in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn purge_item(&self, id: ItemId) -> Result<(), ContextError> {
        sqlx::query("DELETE FROM storefront.inventory_log WHERE item_id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM storefront.items WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Register an account and log it in on `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if either form post fails.
    pub async fn register_and_login(
        &self,
        client: &Client,
        email: &str,
    ) -> Result<reqwest::Response, ContextError> {
        client
            .post(self.url("/register"))
            .form(&[
                ("name", "Integration Tester"),
                ("email", email),
                ("password", TEST_PASSWORD),
                ("phone", "+41 22 000 00 00"),
            ])
            .send()
            .await?;

        Ok(client
            .post(self.url("/login"))
            .form(&[("email", email), ("password", TEST_PASSWORD)])
            .send()
            .await?)
    }

    /// Delete a test account and everything hanging off it.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn purge_user(&self, email: &str) -> Result<(), ContextError> {
        sqlx::query("DELETE FROM storefront.users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Item id from an admin API item payload.
#[must_use]
pub fn item_id(item: &Value) -> Option<ItemId> {
    item.get("id")
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
        .map(ItemId::new)
}
