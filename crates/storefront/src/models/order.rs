//! Carts and orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use fnuc_core::{ItemId, OrderId, OrderStatus, UserId};

/// A cart row joined with its item, for display and checkout.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item_id: ItemId,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub price_id: String,
    pub quantity: i32,
}

impl CartLine {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A fulfilled order with its frozen line items.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub payment_session_id: Option<String>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }
}

/// One purchased item, as it was at fulfillment time.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_total_sums_lines() {
        let order = Order {
            id: OrderId::new(1),
            user_id: UserId::new(1),
            created_at: Utc::now(),
            status: OrderStatus::processing(),
            payment_session_id: Some("cs_test_1".to_string()),
            lines: vec![
                OrderLine {
                    item_id: ItemId::new(3),
                    item_name: "iPhone 12".to_string(),
                    unit_price: Decimal::new(79900, 2),
                    quantity: 2,
                },
                OrderLine {
                    item_id: ItemId::new(5),
                    item_name: "Mi TV 4X".to_string(),
                    unit_price: Decimal::new(500, 0),
                    quantity: 1,
                },
            ],
        };
        assert_eq!(order.total(), Decimal::new(2098, 0));
    }
}
