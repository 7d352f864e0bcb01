//! Customer accounts: sign-up and password login.
//!
//! Hashes are Argon2id PHC strings stored in `users.password_hash`.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use fnuc_core::Email;

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// Shortest password accepted at sign-up, in characters.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration form input.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'r> {
    pub name: &'r str,
    pub email: &'r str,
    pub password: &'r str,
    pub phone: &'r str,
}

/// Account operations over the `users` table.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Borrow the pool for the duration of a request.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Create an unconfirmed, non-admin account.
    ///
    /// # Errors
    ///
    /// Fails with a form error (`MissingField`, `InvalidEmail`, `WeakPassword`)
    /// or `UserAlreadyExists` when the normalized email is taken.
    pub async fn register(&self, form: Registration<'_>) -> Result<User, AuthError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingField("name"));
        }
        let email = Email::parse(form.email)?;
        validate_password(form.password)?;
        let password_hash = hash_password(form.password)?;

        self.users
            .create(&NewUser {
                name,
                email: &email,
                password_hash: &password_hash,
                phone: form.phone.trim(),
                is_admin: false,
                email_confirmed: false,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Check a password against the stored hash.
    ///
    /// # Errors
    ///
    /// Unknown email, malformed email and wrong password all surface as
    /// `AuthError::InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Argon2id hash with a fresh salt. No length rule here; the CLI uses it
/// for development accounts.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .map_err(|_| AuthError::InvalidCredentials)
}
