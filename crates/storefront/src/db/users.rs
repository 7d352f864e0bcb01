//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fnuc_core::{Email, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    phone: String,
    is_admin: bool,
    email_confirmed: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            phone: row.phone,
            is_admin: row.is_admin,
            email_confirmed: row.email_confirmed,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for login lookups.
#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub phone: &'a str,
    pub is_admin: bool,
    pub email_confirmed: bool,
}

/// Outcome of confirming an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The address was unconfirmed and is now confirmed.
    Confirmed,
    /// The address had been confirmed before.
    AlreadyConfirmed,
}

const USER_COLUMNS: &str = "id, name, email, phone, is_admin, email_confirmed, created_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM storefront.users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some((User::try_from(row.user)?, row.password_hash)))
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.users
                (name, email, password_hash, phone, is_admin, email_confirmed)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.phone)
        .bind(new.is_admin)
        .bind(new.email_confirmed)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        User::try_from(row)
    }

    /// Mark an email address as confirmed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account uses the address.
    pub async fn confirm_email(&self, email: &Email) -> Result<Confirmation, RepositoryError> {
        let was_confirmed: Option<bool> = sqlx::query_scalar(
            r"
            UPDATE storefront.users u
            SET email_confirmed = TRUE
            FROM (SELECT id, email_confirmed FROM storefront.users WHERE email = $1 FOR UPDATE) prev
            WHERE u.id = prev.id
            RETURNING prev.email_confirmed
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        match was_confirmed {
            Some(true) => Ok(Confirmation::AlreadyConfirmed),
            Some(false) => Ok(Confirmation::Confirmed),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Whether at least one back-office account exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn admin_exists(&self) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM storefront.users WHERE is_admin)")
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }
}
