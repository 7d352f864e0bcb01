//! Cart operations that span more than one statement.

use sqlx::PgPool;
use tracing::{info, instrument};

use fnuc_core::{GuestCart, UserId};

use crate::db::RepositoryError;
use crate::db::carts::add_tx;

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Move a guest cart into the user's persistent cart.
    ///
    /// Quantities are added to any rows the user already has. Entries for
    /// items that no longer exist are skipped. Everything happens in one
    /// transaction.
    ///
    /// Returns `true` when the guest cart had anything in it, which tells the
    /// caller to clear the cookie.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    #[instrument(skip(self, guest), fields(entries = guest.len()))]
    pub async fn migrate_guest_cart(
        &self,
        user_id: UserId,
        guest: &GuestCart,
    ) -> Result<bool, RepositoryError> {
        if guest.is_empty() {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        let mut migrated = 0usize;
        for (item_id, quantity) in guest.iter() {
            if add_tx(&mut tx, user_id, item_id, quantity).await? {
                migrated += 1;
            }
        }
        tx.commit().await?;

        info!(
            user_id = %user_id,
            migrated,
            skipped = guest.len() - migrated,
            "Guest cart migrated"
        );
        Ok(true)
    }
}
