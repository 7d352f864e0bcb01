//! User domain types.

use chrono::{DateTime, Utc};

use fnuc_core::{Email, UserId};

/// A registered customer or back-office user.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email (unique, lowercased).
    pub email: Email,
    /// Contact phone number.
    pub phone: String,
    /// Back-office access.
    pub is_admin: bool,
    /// Whether the email address has been confirmed.
    pub email_confirmed: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
