//! Inventory levels and the audit log.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use fnuc_core::{ChangeType, InventoryLevels, InventoryLogId, ItemId, LogEntry, UserId};

use super::RepositoryError;
use crate::models::InventoryLogRecord;

#[derive(Debug, sqlx::FromRow)]
struct LevelsRow {
    stock_quantity: i32,
    low_stock_threshold: i32,
    is_published: bool,
}

impl From<LevelsRow> for InventoryLevels {
    fn from(row: LevelsRow) -> Self {
        Self {
            stock_quantity: row.stock_quantity,
            low_stock_threshold: row.low_stock_threshold,
            is_published: row.is_published,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i32,
    item_id: i32,
    user_id: Option<i32>,
    change_type: ChangeType,
    field_name: String,
    old_value: Option<String>,
    new_value: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for InventoryLogRecord {
    fn from(row: LogRow) -> Self {
        Self {
            id: InventoryLogId::new(row.id),
            item_id: ItemId::new(row.item_id),
            user_id: row.user_id.map(UserId::new),
            change_type: row.change_type,
            field_name: row.field_name,
            old_value: row.old_value,
            new_value: row.new_value,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

/// A low-stock item for the dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LowStockRow {
    pub id: i32,
    pub name: String,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
}

/// Repository for inventory reads and backfill.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Return the item's inventory, creating a default row if it has none.
    ///
    /// Idempotent; the backfill itself is not logged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, item_id: ItemId) -> Result<InventoryLevels, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_or_create_tx(&mut conn, item_id).await
    }

    /// Give every untracked item a default inventory row.
    ///
    /// Returns the number of rows created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn backfill_missing(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.inventory (item_id, stock_quantity, low_stock_threshold, is_published)
            SELECT i.id, 0, 0, TRUE
            FROM storefront.items i
            WHERE NOT EXISTS (SELECT 1 FROM storefront.inventory inv WHERE inv.item_id = i.id)
            ON CONFLICT (item_id) DO NOTHING
            ",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Audit history of one item, newest first. Available after deletion.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(
        &self,
        item_id: ItemId,
    ) -> Result<Vec<InventoryLogRecord>, RepositoryError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r"
            SELECT id, item_id, user_id, change_type, field_name, old_value, new_value, note, created_at
            FROM storefront.inventory_log
            WHERE item_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(item_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(InventoryLogRecord::from).collect())
    }

    /// Items with alerting enabled and stock at or below the threshold.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<LowStockRow>, RepositoryError> {
        let rows = sqlx::query_as(
            r"
            SELECT i.id, i.name, inv.stock_quantity, inv.low_stock_threshold
            FROM storefront.inventory inv
            JOIN storefront.items i ON i.id = inv.item_id
            WHERE inv.low_stock_threshold > 0
              AND inv.stock_quantity <= inv.low_stock_threshold
            ORDER BY inv.stock_quantity, i.name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// `get_or_create` on an existing connection.
pub async fn get_or_create_tx(
    conn: &mut PgConnection,
    item_id: ItemId,
) -> Result<InventoryLevels, RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.inventory (item_id, stock_quantity, low_stock_threshold, is_published)
        VALUES ($1, 0, 0, TRUE)
        ON CONFLICT (item_id) DO NOTHING
        ",
    )
    .bind(item_id)
    .execute(&mut *conn)
    .await?;

    let row: LevelsRow = sqlx::query_as(
        r"
        SELECT stock_quantity, low_stock_threshold, is_published
        FROM storefront.inventory
        WHERE item_id = $1
        FOR UPDATE
        ",
    )
    .bind(item_id)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// Insert the inventory row of a new item.
pub async fn insert_tx(
    conn: &mut PgConnection,
    item_id: ItemId,
    levels: &InventoryLevels,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.inventory (item_id, stock_quantity, low_stock_threshold, is_published)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(item_id)
    .bind(levels.stock_quantity)
    .bind(levels.low_stock_threshold)
    .bind(levels.is_published)
    .execute(conn)
    .await?;
    Ok(())
}

/// Overwrite an item's inventory levels.
pub async fn update_tx(
    conn: &mut PgConnection,
    item_id: ItemId,
    levels: &InventoryLevels,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.inventory
        SET stock_quantity = $2, low_stock_threshold = $3, is_published = $4, updated_at = NOW()
        WHERE item_id = $1
        ",
    )
    .bind(item_id)
    .bind(levels.stock_quantity)
    .bind(levels.low_stock_threshold)
    .bind(levels.is_published)
    .execute(conn)
    .await?;
    Ok(())
}

/// Append audit entries for one item.
pub async fn insert_logs_tx(
    conn: &mut PgConnection,
    item_id: ItemId,
    actor: Option<UserId>,
    entries: &[LogEntry],
) -> Result<(), RepositoryError> {
    for entry in entries {
        sqlx::query(
            r"
            INSERT INTO storefront.inventory_log
                (item_id, user_id, change_type, field_name, old_value, new_value, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(item_id)
        .bind(actor)
        .bind(entry.change_type)
        .bind(entry.field_name)
        .bind(entry.old_value.as_deref())
        .bind(entry.new_value.as_deref())
        .bind(entry.note.as_deref())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
