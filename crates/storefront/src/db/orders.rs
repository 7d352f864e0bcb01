//! Orders and their frozen line items.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use fnuc_core::{ItemId, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::{CartLine, Order, OrderLine};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    payment_session_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    order_id: i32,
    item_id: i32,
    item_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<&OrderLineRow> for OrderLine {
    fn from(row: &OrderLineRow) -> Self {
        Self {
            item_id: ItemId::new(row.item_id),
            item_name: row.item_name.clone(),
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Attach line items to their orders, preserving order row order.
fn assemble(orders: Vec<OrderRow>, lines: &[OrderLineRow]) -> Vec<Order> {
    let mut by_order: HashMap<i32, Vec<OrderLine>> = HashMap::new();
    for line in lines {
        by_order
            .entry(line.order_id)
            .or_default()
            .push(OrderLine::from(line));
    }

    orders
        .into_iter()
        .map(|row| Order {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            created_at: row.created_at,
            status: row.status,
            payment_session_id: row.payment_session_id,
            lines: by_order.remove(&row.id).unwrap_or_default(),
        })
        .collect()
}

const ORDER_COLUMNS: &str = "id, user_id, created_at, status, payment_session_id";

/// Repository for order reads and status edits.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders with line items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        let lines = self.lines_for(&ids).await?;
        Ok(assemble(orders, &lines))
    }

    /// One order with its line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };
        let lines = self.lines_for(&[order.id]).await?;
        Ok(assemble(vec![order], &lines).pop())
    }

    /// The most recent orders across all users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let orders: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        let lines = self.lines_for(&ids).await?;
        Ok(assemble(orders, &lines))
    }

    /// Replace an order's status label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE storefront.orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn lines_for(&self, order_ids: &[i32]) -> Result<Vec<OrderLineRow>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as(
            r"
            SELECT order_id, item_id, item_name, unit_price, quantity
            FROM storefront.ordered_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Insert an order unless one already exists for the payment session.
///
/// Returns `None` when the session was already fulfilled.
pub async fn insert_if_new_tx(
    conn: &mut PgConnection,
    user_id: UserId,
    payment_session_id: &str,
    created_at: DateTime<Utc>,
) -> Result<Option<OrderId>, RepositoryError> {
    let id: Option<i32> = sqlx::query_scalar(
        r"
        INSERT INTO storefront.orders (user_id, created_at, status, payment_session_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (payment_session_id) DO NOTHING
        RETURNING id
        ",
    )
    .bind(user_id)
    .bind(created_at)
    .bind(OrderStatus::PROCESSING)
    .bind(payment_session_id)
    .fetch_optional(conn)
    .await?;
    Ok(id.map(OrderId::new))
}

/// Record one purchased line, snapshotting the item's name and price.
pub async fn insert_line_tx(
    conn: &mut PgConnection,
    order_id: OrderId,
    line: &CartLine,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.ordered_items (order_id, item_id, item_name, unit_price, quantity)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(order_id)
    .bind(line.item_id)
    .bind(&line.name)
    .bind(line.price)
    .bind(line.quantity)
    .execute(conn)
    .await?;
    Ok(())
}
