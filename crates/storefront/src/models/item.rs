//! Catalogue items and their inventory.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use fnuc_core::{ChangeType, InventoryLevels, InventoryLogId, ItemId, UserId};

/// A catalogue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    /// Image URL or site path.
    pub image: String,
    /// HTML-ish description shown on the item page.
    pub details: String,
    /// Payment provider price identifier.
    pub price_id: String,
}

/// An item joined with its inventory row, if any.
#[derive(Debug, Clone)]
pub struct ItemWithInventory {
    pub item: Item,
    pub inventory: Option<InventoryLevels>,
}

impl ItemWithInventory {
    /// Inventory levels, with backfill defaults for items that have none.
    #[must_use]
    pub fn levels(&self) -> InventoryLevels {
        self.inventory.unwrap_or_default()
    }

    /// Public visibility: published, or not yet tracked.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.inventory.is_none_or(|inv| inv.is_published)
    }
}

/// JSON representation used by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPayload {
    pub id: ItemId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: String,
    pub image: String,
    pub details: String,
    pub price_id: String,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub is_published: bool,
    pub low_stock: bool,
}

impl From<&ItemWithInventory> for ItemPayload {
    fn from(row: &ItemWithInventory) -> Self {
        let levels = row.levels();
        Self {
            id: row.item.id,
            name: row.item.name.clone(),
            price: row.item.price,
            category: row.item.category.clone(),
            image: row.item.image.clone(),
            details: row.item.details.clone(),
            price_id: row.item.price_id.clone(),
            stock_quantity: levels.stock_quantity,
            low_stock_threshold: levels.low_stock_threshold,
            is_published: levels.is_published,
            low_stock: levels.low_stock(),
        }
    }
}

/// A persisted audit-log row.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryLogRecord {
    pub id: InventoryLogId,
    pub item_id: ItemId,
    pub user_id: Option<UserId>,
    pub change_type: ChangeType,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: ItemId::new(3),
            name: "iPhone 12".to_string(),
            price: Decimal::new(79900, 2),
            category: "Apple".to_string(),
            image: "/static/uploads/placeholder.png".to_string(),
            details: "A14 Bionic chip".to_string(),
            price_id: "price_123".to_string(),
        }
    }

    #[test]
    fn test_untracked_item_is_visible_with_defaults() {
        let row = ItemWithInventory {
            item: item(),
            inventory: None,
        };
        assert!(row.is_visible());
        assert_eq!(row.levels(), InventoryLevels::BACKFILL);
    }

    #[test]
    fn test_unpublished_item_is_hidden() {
        let row = ItemWithInventory {
            item: item(),
            inventory: Some(InventoryLevels {
                stock_quantity: 4,
                low_stock_threshold: 1,
                is_published: false,
            }),
        };
        assert!(!row.is_visible());
    }

    #[test]
    fn test_payload_serializes_price_as_number() {
        let row = ItemWithInventory {
            item: item(),
            inventory: Some(InventoryLevels {
                stock_quantity: 1,
                low_stock_threshold: 2,
                is_published: true,
            }),
        };
        let json = serde_json::to_value(ItemPayload::from(&row)).unwrap();
        assert_eq!(json["price"], serde_json::json!(799.0));
        assert_eq!(json["low_stock"], serde_json::json!(true));
        assert_eq!(json["id"], serde_json::json!(3));
    }
}
