//! Inventory levels and audit-log bookkeeping.
//!
//! Every back-office change to an item's price, stock, alert threshold or
//! publication flag is recorded as one [`LogEntry`] per changed field. The
//! functions here compute those entries from before/after snapshots; the
//! storefront persists them in the same transaction as the change itself.
//!
//! Values are stored as their `Display` text (`5`, `true`, `19.99`) and a
//! field that did not change never produces an entry.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock and visibility of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevels {
    /// Units on hand (never negative).
    pub stock_quantity: i32,
    /// Alert threshold; `0` disables low-stock alerts.
    pub low_stock_threshold: i32,
    /// Whether the item is listed in the public catalogue.
    pub is_published: bool,
}

impl InventoryLevels {
    /// Levels given to items that predate inventory tracking.
    pub const BACKFILL: Self = Self {
        stock_quantity: 0,
        low_stock_threshold: 0,
        is_published: true,
    };

    /// True when alerting is enabled and stock is at or below the threshold.
    #[must_use]
    pub const fn low_stock(&self) -> bool {
        self.low_stock_threshold > 0 && self.stock_quantity <= self.low_stock_threshold
    }
}

impl Default for InventoryLevels {
    fn default() -> Self {
        Self::BACKFILL
    }
}

/// Kind of mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.inventory_change_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Initial values of a new item.
    Create,
    /// Field edited through a form or PATCH.
    Update,
    /// Stock changed through the adjustment endpoint.
    Adjust,
    /// Item removed.
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Adjust => write!(f, "adjust"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Audited field names.
pub mod fields {
    pub const PRICE: &str = "price";
    pub const STOCK_QUANTITY: &str = "stock_quantity";
    pub const LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";
    pub const IS_PUBLISHED: &str = "is_published";
    pub const ITEM: &str = "item";
}

/// One audit-log row, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub change_type: ChangeType,
    pub field_name: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub note: Option<String>,
}

impl LogEntry {
    fn new(
        change_type: ChangeType,
        field_name: &'static str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            change_type,
            field_name,
            old_value,
            new_value,
            note: None,
        }
    }

    fn with_note(mut self, note: Option<&str>) -> Self {
        self.note = note.map(str::to_owned);
        self
    }

    /// Entry recording the removal of an item.
    #[must_use]
    pub fn deletion(item_name: &str, note: &str) -> Self {
        Self::new(
            ChangeType::Delete,
            fields::ITEM,
            Some(item_name.to_owned()),
            None,
        )
        .with_note(Some(note))
    }
}

/// Entries for a newly created item.
///
/// Stock and publication are always logged; the threshold only when set.
#[must_use]
pub fn creation_entries(levels: &InventoryLevels, stock_note: Option<&str>) -> Vec<LogEntry> {
    let mut entries = vec![
        LogEntry::new(
            ChangeType::Create,
            fields::STOCK_QUANTITY,
            None,
            Some(levels.stock_quantity.to_string()),
        )
        .with_note(stock_note),
        LogEntry::new(
            ChangeType::Create,
            fields::IS_PUBLISHED,
            None,
            Some(levels.is_published.to_string()),
        ),
    ];
    if levels.low_stock_threshold != 0 {
        entries.push(LogEntry::new(
            ChangeType::Create,
            fields::LOW_STOCK_THRESHOLD,
            None,
            Some(levels.low_stock_threshold.to_string()),
        ));
    }
    entries
}

/// Entries for an edit, one per changed field.
///
/// `price` carries the `(old, new)` pair when the caller touched the price.
#[must_use]
pub fn update_entries(
    before: &InventoryLevels,
    after: &InventoryLevels,
    price: Option<(Decimal, Decimal)>,
    stock_note: Option<&str>,
) -> Vec<LogEntry> {
    let mut entries = Vec::new();

    if let Some((old, new)) = price
        && old != new
    {
        entries.push(LogEntry::new(
            ChangeType::Update,
            fields::PRICE,
            Some(old.normalize().to_string()),
            Some(new.normalize().to_string()),
        ));
    }

    if before.stock_quantity != after.stock_quantity {
        entries.push(
            LogEntry::new(
                ChangeType::Update,
                fields::STOCK_QUANTITY,
                Some(before.stock_quantity.to_string()),
                Some(after.stock_quantity.to_string()),
            )
            .with_note(stock_note),
        );
    }

    if before.low_stock_threshold != after.low_stock_threshold {
        entries.push(LogEntry::new(
            ChangeType::Update,
            fields::LOW_STOCK_THRESHOLD,
            Some(before.low_stock_threshold.to_string()),
            Some(after.low_stock_threshold.to_string()),
        ));
    }

    if before.is_published != after.is_published {
        entries.push(LogEntry::new(
            ChangeType::Update,
            fields::IS_PUBLISHED,
            Some(before.is_published.to_string()),
            Some(after.is_published.to_string()),
        ));
    }

    entries
}

/// Stock adjustment that cannot be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("Resulting quantity cannot be negative")]
    Negative,
    /// Above what the `stock_quantity` column holds.
    #[error("Resulting quantity is too large")]
    OutOfRange,
}

/// Requested stock change: relative or absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAdjustment {
    /// Add (or subtract) units.
    Delta(i64),
    /// Replace the stock with an exact count.
    Quantity(i64),
}

impl StockAdjustment {
    /// Compute the new stock level.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Negative`] below zero and
    /// [`StockError::OutOfRange`] above `i32::MAX`.
    pub fn apply(self, current: i32) -> Result<i32, StockError> {
        let target = match self {
            Self::Delta(delta) => i64::from(current).saturating_add(delta),
            Self::Quantity(quantity) => quantity,
        };
        if target < 0 {
            return Err(StockError::Negative);
        }
        i32::try_from(target).map_err(|_| StockError::OutOfRange)
    }

    /// Note used when the caller did not supply one.
    #[must_use]
    pub const fn default_note(self) -> &'static str {
        match self {
            Self::Delta(_) => "Delta update",
            Self::Quantity(_) => "Quantity override",
        }
    }

    /// Audit entry for this adjustment, if it changes anything.
    #[must_use]
    pub fn entry(self, old: i32, new: i32, note: Option<&str>) -> Option<LogEntry> {
        (old != new).then(|| {
            LogEntry::new(
                ChangeType::Adjust,
                fields::STOCK_QUANTITY,
                Some(old.to_string()),
                Some(new.to_string()),
            )
            .with_note(Some(note.unwrap_or_else(|| self.default_note())))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const fn levels(stock: i32, threshold: i32, published: bool) -> InventoryLevels {
        InventoryLevels {
            stock_quantity: stock,
            low_stock_threshold: threshold,
            is_published: published,
        }
    }

    #[test]
    fn test_low_stock() {
        assert!(!levels(5, 2, true).low_stock());
        assert!(levels(2, 2, true).low_stock());
        assert!(levels(1, 2, true).low_stock());
        // threshold 0 disables alerting, even at zero stock
        assert!(!levels(0, 0, true).low_stock());
    }

    #[test]
    fn test_backfill_defaults() {
        let backfill = InventoryLevels::default();
        assert_eq!(backfill, levels(0, 0, true));
        assert!(!backfill.low_stock());
    }

    #[test]
    fn test_creation_logs_stock_and_published() {
        let entries = creation_entries(&levels(5, 0, true), Some("Created via API"));
        let names: Vec<_> = entries.iter().map(|e| e.field_name).collect();
        assert_eq!(names, vec!["stock_quantity", "is_published"]);
        assert_eq!(entries[0].new_value.as_deref(), Some("5"));
        assert_eq!(entries[0].note.as_deref(), Some("Created via API"));
        assert_eq!(entries[1].new_value.as_deref(), Some("true"));
        assert!(entries.iter().all(|e| e.change_type == ChangeType::Create));
        assert!(entries.iter().all(|e| e.old_value.is_none()));
    }

    #[test]
    fn test_creation_logs_threshold_when_set() {
        let entries = creation_entries(&levels(5, 2, true), None);
        let names: Vec<_> = entries.iter().map(|e| e.field_name).collect();
        assert_eq!(
            names,
            vec!["stock_quantity", "is_published", "low_stock_threshold"]
        );
    }

    #[test]
    fn test_update_without_changes_logs_nothing() {
        let same = levels(5, 2, true);
        let price = Decimal::new(1999, 2);
        assert!(update_entries(&same, &same, Some((price, price)), None).is_empty());
        assert!(update_entries(&same, &same, None, Some("note")).is_empty());
    }

    #[test]
    fn test_update_logs_only_changed_stock() {
        let entries = update_entries(&levels(5, 2, true), &levels(1, 2, true), None, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field_name, "stock_quantity");
        assert_eq!(entries[0].old_value.as_deref(), Some("5"));
        assert_eq!(entries[0].new_value.as_deref(), Some("1"));
        assert!(levels(1, 2, true).low_stock());
    }

    #[test]
    fn test_update_logs_every_changed_field_in_order() {
        let entries = update_entries(
            &levels(10, 3, true),
            &levels(4, 5, false),
            Some((Decimal::new(1999, 2), Decimal::new(2999, 2))),
            Some("recount"),
        );
        let names: Vec<_> = entries.iter().map(|e| e.field_name).collect();
        assert_eq!(
            names,
            vec![
                "price",
                "stock_quantity",
                "low_stock_threshold",
                "is_published"
            ]
        );
        assert_eq!(entries[0].old_value.as_deref(), Some("19.99"));
        assert_eq!(entries[0].new_value.as_deref(), Some("29.99"));
        assert_eq!(entries[1].note.as_deref(), Some("recount"));
        assert!(entries[0].note.is_none());
        assert_eq!(entries[3].new_value.as_deref(), Some("false"));
    }

    #[test]
    fn test_price_values_are_normalized() {
        let entries = update_entries(
            &levels(1, 0, true),
            &levels(1, 0, true),
            Some((Decimal::new(79900, 2), Decimal::new(750, 0))),
            None,
        );
        assert_eq!(entries[0].old_value.as_deref(), Some("799"));
        assert_eq!(entries[0].new_value.as_deref(), Some("750"));
    }

    #[test]
    fn test_adjust_delta() {
        assert_eq!(StockAdjustment::Delta(3).apply(2), Ok(5));
        assert_eq!(StockAdjustment::Delta(-2).apply(2), Ok(0));
        assert_eq!(StockAdjustment::Delta(-3).apply(2), Err(StockError::Negative));
    }

    #[test]
    fn test_adjust_quantity() {
        assert_eq!(StockAdjustment::Quantity(7).apply(2), Ok(7));
        assert_eq!(StockAdjustment::Quantity(-1).apply(2), Err(StockError::Negative));
    }

    #[test]
    fn test_adjust_beyond_column_range() {
        assert_eq!(
            StockAdjustment::Quantity(5_000_000_000).apply(2),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            StockAdjustment::Delta(i64::from(i32::MAX)).apply(1),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            StockAdjustment::Quantity(i64::from(i32::MAX)).apply(0),
            Ok(i32::MAX)
        );
    }

    #[test]
    fn test_adjust_entry() {
        let entry = StockAdjustment::Delta(3).entry(2, 5, None).unwrap();
        assert_eq!(entry.change_type, ChangeType::Adjust);
        assert_eq!(entry.new_value.as_deref(), Some("5"));
        assert_eq!(entry.note.as_deref(), Some("Delta update"));

        let entry = StockAdjustment::Quantity(9)
            .entry(2, 9, Some("Restock"))
            .unwrap();
        assert_eq!(entry.note.as_deref(), Some("Restock"));

        assert!(StockAdjustment::Quantity(2).entry(2, 2, None).is_none());
    }

    #[test]
    fn test_deletion_entry() {
        let entry = LogEntry::deletion("iPhone 12", "Item deleted via API.");
        assert_eq!(entry.change_type, ChangeType::Delete);
        assert_eq!(entry.field_name, "item");
        assert_eq!(entry.old_value.as_deref(), Some("iPhone 12"));
        assert!(entry.new_value.is_none());
        assert_eq!(entry.note.as_deref(), Some("Item deleted via API."));
    }

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::Adjust.to_string(), "adjust");
        assert_eq!(
            serde_json::to_string(&ChangeType::Delete).unwrap(),
            "\"delete\""
        );
    }
}
