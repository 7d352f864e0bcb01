//! Persistent carts of logged-in users.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use fnuc_core::{GuestCart, ItemId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    item_id: i32,
    name: String,
    price: Decimal,
    image: String,
    price_id: String,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            item_id: ItemId::new(row.item_id),
            name: row.name,
            price: row.price,
            image: row.image,
            price_id: row.price_id,
            quantity: row.quantity,
        }
    }
}

const LINES_SELECT: &str = r"
    SELECT c.item_id, i.name, i.price, i.image, i.price_id, c.quantity
    FROM storefront.cart c
    JOIN storefront.items i ON i.id = c.item_id
    WHERE c.user_id = $1
";

/// Repository for cart rows.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart with item details, in item order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(&format!("{LINES_SELECT} ORDER BY c.item_id"))
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// The user's cart as an item-to-quantity mapping.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn as_mapping(&self, user_id: UserId) -> Result<GuestCart, RepositoryError> {
        let rows: Vec<(i32, i32)> =
            sqlx::query_as("SELECT item_id, quantity FROM storefront.cart WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(item_id, quantity)| (ItemId::new(item_id), quantity))
            .collect())
    }

    /// Total quantity across the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_quantity(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM storefront.cart WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(total)
    }

    /// Add units of an item, creating the row if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        item_id: ItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if add_tx(&mut conn, user_id, item_id, quantity).await? {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    /// Remove units of an item; rows that reach zero are deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        item_id: ItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        subtract_tx(&mut tx, user_id, item_id, quantity).await?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Add units of an item to a user's cart.
///
/// Returns `false` (and writes nothing) when the item does not exist.
pub async fn add_tx(
    conn: &mut PgConnection,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO storefront.cart (user_id, item_id, quantity)
        SELECT $1, i.id, $3 FROM storefront.items i WHERE i.id = $2
        ON CONFLICT (user_id, item_id)
        DO UPDATE SET quantity = storefront.cart.quantity + EXCLUDED.quantity
        ",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Subtract units from a cart row, deleting it when nothing is left.
pub async fn subtract_tx(
    conn: &mut PgConnection,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let remaining: Option<i32> = sqlx::query_scalar(
        r"
        SELECT quantity FROM storefront.cart
        WHERE user_id = $1 AND item_id = $2
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(current) = remaining else {
        return Ok(());
    };

    let left = current.saturating_sub(quantity);
    if left > 0 {
        sqlx::query("UPDATE storefront.cart SET quantity = $3 WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .bind(left)
            .execute(conn)
            .await?;
    } else {
        sqlx::query("DELETE FROM storefront.cart WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(conn)
            .await?;
    }
    Ok(())
}

/// Lock and return the user's cart lines.
pub async fn lock_lines_tx(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows: Vec<CartLineRow> = sqlx::query_as(&format!(
        "{LINES_SELECT} ORDER BY c.item_id FOR UPDATE OF c"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(CartLine::from).collect())
}
