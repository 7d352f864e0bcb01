//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a back-office user with a generated password
//! fnuc-cli admin create -e staff@example.com -n "Staff Name"
//!
//! # Create one with a chosen password
//! fnuc-cli admin create -e staff@example.com -n "Staff Name" -p 'correct horse battery'
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;

use fnuc_core::{Email, UserId};
use fnuc_storefront::db::users::NewUser;
use fnuc_storefront::db::{RepositoryError, UserRepository};
use fnuc_storefront::services::AuthError;
use fnuc_storefront::services::auth::hash_password;

use super::{DatabaseSetupError, connect};

/// Length of generated passwords.
const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Setup(#[from] DatabaseSetupError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Name is blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// User already exists.
    #[error("A user already exists with email: {0}")]
    UserExists(String),

    /// Password hashing failed.
    #[error("Could not hash password: {0}")]
    Hash(#[from] AuthError),

    /// Database error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Create a new admin user with a confirmed email.
///
/// # Arguments
///
/// * `email` - Admin's email address
/// * `name` - Admin's display name
/// * `password` - Login password; generated and printed when `None`
///
/// # Returns
///
/// The ID of the created admin user.
pub async fn create_user(
    email: &str,
    name: &str,
    password: Option<&str>,
) -> Result<UserId, AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminError::EmptyName);
    }

    let generated = password.is_none();
    let password = password.map_or_else(generate_password, str::to_owned);
    let password_hash = hash_password(&password)?;

    let pool = connect().await?;
    tracing::info!("Creating admin user: {}", parsed);

    let user = UserRepository::new(&pool)
        .create(&NewUser {
            name,
            email: &parsed,
            password_hash: &password_hash,
            phone: "",
            is_admin: true,
            email_confirmed: true,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(parsed.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password: {password}");
        }
        tracing::warn!("Store the generated password now; it is not shown again.");
    }

    Ok(user.id)
}
