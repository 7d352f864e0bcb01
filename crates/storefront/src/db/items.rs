//! Catalogue item queries.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use fnuc_core::{InventoryLevels, ItemId};

use super::RepositoryError;
use crate::models::{Item, ItemWithInventory};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    name: String,
    price: Decimal,
    category: String,
    image: String,
    details: String,
    price_id: String,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemId::new(row.id),
            name: row.name,
            price: row.price,
            category: row.category,
            image: row.image,
            details: row.details,
            price_id: row.price_id,
        }
    }
}

/// Item left-joined with inventory; the inventory columns are all NULL when
/// the item has never been tracked.
#[derive(Debug, sqlx::FromRow)]
struct ItemInventoryRow {
    #[sqlx(flatten)]
    item: ItemRow,
    stock_quantity: Option<i32>,
    low_stock_threshold: Option<i32>,
    is_published: Option<bool>,
}

impl From<ItemInventoryRow> for ItemWithInventory {
    fn from(row: ItemInventoryRow) -> Self {
        let inventory = match (
            row.stock_quantity,
            row.low_stock_threshold,
            row.is_published,
        ) {
            (Some(stock_quantity), Some(low_stock_threshold), Some(is_published)) => {
                Some(InventoryLevels {
                    stock_quantity,
                    low_stock_threshold,
                    is_published,
                })
            }
            _ => None,
        };
        Self {
            item: row.item.into(),
            inventory,
        }
    }
}

const ITEM_COLUMNS: &str = "i.id, i.name, i.price, i.category, i.image, i.details, i.price_id";

const JOINED_SELECT: &str = r"
    SELECT i.id, i.name, i.price, i.category, i.image, i.details, i.price_id,
           inv.stock_quantity, inv.low_stock_threshold, inv.is_published
    FROM storefront.items i
    LEFT JOIN storefront.inventory inv ON inv.item_id = i.id
";

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fields for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub image: String,
    pub details: String,
    pub price_id: String,
}

/// Repository for catalogue reads.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an item by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.items i WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Item::from))
    }

    /// Get several items by ID, in ID order. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ItemId]) -> Result<Vec<Item>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ItemId::as_i32).collect();
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.items i WHERE i.id = ANY($1) ORDER BY i.id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Get an item with its inventory.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_inventory(
        &self,
        id: ItemId,
    ) -> Result<Option<ItemWithInventory>, RepositoryError> {
        let row: Option<ItemInventoryRow> =
            sqlx::query_as(&format!("{JOINED_SELECT} WHERE i.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(ItemWithInventory::from))
    }

    /// All items with their inventory, in ID order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_inventory(&self) -> Result<Vec<ItemWithInventory>, RepositoryError> {
        let rows: Vec<ItemInventoryRow> =
            sqlx::query_as(&format!("{JOINED_SELECT} ORDER BY i.id"))
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(ItemWithInventory::from).collect())
    }

    /// Items shown in the public catalogue: published, or not yet tracked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_visible(&self) -> Result<Vec<ItemWithInventory>, RepositoryError> {
        let rows: Vec<ItemInventoryRow> = sqlx::query_as(&format!(
            "{JOINED_SELECT} WHERE inv.item_id IS NULL OR inv.is_published ORDER BY i.id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(ItemWithInventory::from).collect())
    }

    /// Visible items whose name contains `query` (case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_visible(
        &self,
        query: &str,
    ) -> Result<Vec<ItemWithInventory>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(query));
        let rows: Vec<ItemInventoryRow> = sqlx::query_as(&format!(
            r"{JOINED_SELECT}
            WHERE i.name LIKE $1 ESCAPE '\'
              AND (inv.item_id IS NULL OR inv.is_published)
            ORDER BY i.id"
        ))
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(ItemWithInventory::from).collect())
    }

    /// Number of items in the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.items")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Insert an item.
pub async fn insert_tx(conn: &mut PgConnection, new: &NewItem) -> Result<Item, RepositoryError> {
    let row: ItemRow = sqlx::query_as(
        r"
        INSERT INTO storefront.items (name, price, category, image, details, price_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, price, category, image, details, price_id
        ",
    )
    .bind(&new.name)
    .bind(new.price)
    .bind(&new.category)
    .bind(&new.image)
    .bind(&new.details)
    .bind(&new.price_id)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// Load an item and lock its row for the rest of the transaction.
pub async fn lock_tx(conn: &mut PgConnection, id: ItemId) -> Result<Option<Item>, RepositoryError> {
    let row: Option<ItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM storefront.items i WHERE i.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Item::from))
}

/// Write every descriptive field of an item.
pub async fn update_tx(conn: &mut PgConnection, item: &Item) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.items
        SET name = $2, price = $3, category = $4, image = $5, details = $6, price_id = $7
        WHERE id = $1
        ",
    )
    .bind(item.id)
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.category)
    .bind(&item.image)
    .bind(&item.details)
    .bind(&item.price_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Delete an item; its inventory and cart rows cascade.
pub async fn delete_tx(conn: &mut PgConnection, id: ItemId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.items WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
