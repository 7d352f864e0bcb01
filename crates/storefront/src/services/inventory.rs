//! Catalogue and inventory mutations with audit logging.
//!
//! Each operation runs in a single transaction: the item row is locked, the
//! change is applied, and one audit row per changed field is written before
//! commit. The acting user is recorded when the change came from an admin
//! session and left empty for API-token calls.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use fnuc_core::{
    InventoryLevels, ItemId, LogEntry, StockAdjustment, UserId, creation_entries, update_entries,
};

use crate::db::items::{self, NewItem};
use crate::db::{RepositoryError, inventory};
use crate::models::{Item, ItemWithInventory};

/// Errors that can occur in inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Input rejected; the message is shown to the caller as-is.
    #[error("{0}")]
    Validation(String),

    /// The item does not exist.
    #[error("Item not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Partial update of an item. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub details: Option<String>,
    pub price_id: Option<String>,
    pub image: Option<String>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub is_published: Option<bool>,
    /// Attached to the stock entry of the audit log.
    pub note: Option<String>,
}

impl ItemPatch {
    fn apply_to_item(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name.clone_from(name);
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = &self.category {
            item.category.clone_from(category);
        }
        if let Some(details) = &self.details {
            item.details.clone_from(details);
        }
        if let Some(price_id) = &self.price_id {
            item.price_id.clone_from(price_id);
        }
        if let Some(image) = &self.image {
            item.image.clone_from(image);
        }
    }

    fn apply_to_levels(&self, levels: &InventoryLevels) -> InventoryLevels {
        InventoryLevels {
            stock_quantity: self.stock_quantity.unwrap_or(levels.stock_quantity),
            low_stock_threshold: self
                .low_stock_threshold
                .unwrap_or(levels.low_stock_threshold),
            is_published: self.is_published.unwrap_or(levels.is_published),
        }
    }
}

/// Inventory service.
pub struct InventoryService<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryService<'a> {
    /// Create a new inventory service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an item together with its inventory.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Repository` if a query fails.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_item(
        &self,
        new: &NewItem,
        levels: InventoryLevels,
        stock_note: &str,
        actor: Option<UserId>,
    ) -> Result<ItemWithInventory, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let item = items::insert_tx(&mut tx, new).await?;
        inventory::insert_tx(&mut tx, item.id, &levels).await?;
        inventory::insert_logs_tx(
            &mut tx,
            item.id,
            actor,
            &creation_entries(&levels, Some(stock_note)),
        )
        .await?;

        tx.commit().await?;

        info!(item_id = %item.id, stock = levels.stock_quantity, "Item created");
        Ok(ItemWithInventory {
            item,
            inventory: Some(levels),
        })
    }

    /// Apply a partial update, logging every changed audited field.
    ///
    /// Items without an inventory row get one first; that backfill is not
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotFound` if the item does not exist.
    #[instrument(skip(self, patch))]
    pub async fn update_item(
        &self,
        id: ItemId,
        patch: &ItemPatch,
        actor: Option<UserId>,
    ) -> Result<ItemWithInventory, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let mut item = items::lock_tx(&mut tx, id)
            .await?
            .ok_or(InventoryError::NotFound)?;
        let before = inventory::get_or_create_tx(&mut tx, id).await?;

        let old_price = item.price;
        patch.apply_to_item(&mut item);
        let after = patch.apply_to_levels(&before);

        let entries = update_entries(
            &before,
            &after,
            patch.price.map(|_| (old_price, item.price)),
            patch.note.as_deref(),
        );

        items::update_tx(&mut tx, &item).await?;
        if after != before {
            inventory::update_tx(&mut tx, id, &after).await?;
        }
        inventory::insert_logs_tx(&mut tx, id, actor, &entries).await?;

        tx.commit().await?;

        info!(item_id = %id, changes = entries.len(), "Item updated");
        Ok(ItemWithInventory {
            item,
            inventory: Some(after),
        })
    }

    /// Change the stock level by a delta or to an exact quantity.
    ///
    /// Nothing is written when the result would be negative. An adjustment
    /// that leaves the stock unchanged is not logged.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotFound` if the item does not exist.
    /// Returns `InventoryError::Validation` if the stock would go negative.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        id: ItemId,
        adjustment: StockAdjustment,
        note: Option<&str>,
        actor: Option<UserId>,
    ) -> Result<ItemWithInventory, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let item = items::lock_tx(&mut tx, id)
            .await?
            .ok_or(InventoryError::NotFound)?;
        let before = inventory::get_or_create_tx(&mut tx, id).await?;

        let new_quantity = adjustment
            .apply(before.stock_quantity)
            .map_err(|e| InventoryError::Validation(e.to_string()))?;
        let after = InventoryLevels {
            stock_quantity: new_quantity,
            ..before
        };

        if let Some(entry) = adjustment.entry(before.stock_quantity, new_quantity, note) {
            inventory::update_tx(&mut tx, id, &after).await?;
            inventory::insert_logs_tx(&mut tx, id, actor, &[entry]).await?;
        }

        tx.commit().await?;

        info!(
            item_id = %id,
            old = before.stock_quantity,
            new = new_quantity,
            "Stock adjusted"
        );
        Ok(ItemWithInventory {
            item,
            inventory: Some(after),
        })
    }

    /// Delete an item. Its audit history is kept.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotFound` if the item does not exist.
    #[instrument(skip(self))]
    pub async fn delete_item(
        &self,
        id: ItemId,
        actor: Option<UserId>,
        note: &str,
    ) -> Result<Item, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let item = items::lock_tx(&mut tx, id)
            .await?
            .ok_or(InventoryError::NotFound)?;
        inventory::insert_logs_tx(&mut tx, id, actor, &[LogEntry::deletion(&item.name, note)])
            .await?;
        items::delete_tx(&mut tx, id).await?;

        tx.commit().await?;

        info!(item_id = %id, name = %item.name, "Item deleted");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: ItemId::new(1),
            name: "Mi TV 4X".to_owned(),
            price: Decimal::new(500, 0),
            category: "Television".to_owned(),
            image: "/static/uploads/mi%20tv.jpg".to_owned(),
            details: "Smart Android TV".to_owned(),
            price_id: "price_tv".to_owned(),
        }
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut patched = item();
        let patch = ItemPatch::default();
        patch.apply_to_item(&mut patched);
        assert_eq!(patched, item());

        let levels = InventoryLevels {
            stock_quantity: 7,
            low_stock_threshold: 2,
            is_published: true,
        };
        assert_eq!(patch.apply_to_levels(&levels), levels);
    }

    #[test]
    fn test_patch_overrides_given_fields_only() {
        let patch = ItemPatch {
            name: Some("Mi TV 5X".to_owned()),
            price: Some(Decimal::new(54999, 2)),
            stock_quantity: Some(3),
            is_published: Some(false),
            ..ItemPatch::default()
        };

        let mut patched = item();
        patch.apply_to_item(&mut patched);
        assert_eq!(patched.name, "Mi TV 5X");
        assert_eq!(patched.price, Decimal::new(54999, 2));
        assert_eq!(patched.category, "Television");

        let after = patch.apply_to_levels(&InventoryLevels::BACKFILL);
        assert_eq!(after.stock_quantity, 3);
        assert_eq!(after.low_stock_threshold, 0);
        assert!(!after.is_published);
    }
}
