//! Back-office dashboard aggregates.
//!
//! Everything is computed per request straight from the tables; there is no
//! cache. Revenue always excludes orders whose status is `cancelled`
//! (case-insensitive) and is summed from the frozen line-item prices.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use super::inventory::{InventoryRepository, LowStockRow};
use super::orders::OrderRepository;
use crate::models::Order;

/// Number of days in the dashboard activity window.
const WINDOW_DAYS: i64 = 7;
const TOP_ITEMS: i64 = 5;
const RECENT_ORDERS: i64 = 10;

/// Orders placed on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    /// `%Y-%m-%d`
    pub date: String,
    /// `%a`, e.g. `Mon`
    pub day: String,
    pub count: i64,
}

/// A best-selling item.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopItem {
    pub item_id: i32,
    pub name: String,
    pub quantity: i64,
}

/// Everything shown on the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub total_revenue: Decimal,
    pub order_count: i64,
    pub user_count: i64,
    pub item_count: i64,
    /// Order count per lowercased status, sorted by status.
    pub status_counts: Vec<(String, i64)>,
    pub recent_order_count: i64,
    pub recent_revenue: Decimal,
    pub low_stock: Vec<LowStockRow>,
    pub top_items: Vec<TopItem>,
    pub recent_orders: Vec<Order>,
    /// Oldest day first, ending today.
    pub daily_orders: Vec<DailyCount>,
}

/// Build the fixed-length daily series ending on `today`, filling gaps with zero.
#[must_use]
pub fn daily_series(today: NaiveDate, counts: &HashMap<NaiveDate, i64>) -> Vec<DailyCount> {
    (0..WINDOW_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailyCount {
                date: date.format("%Y-%m-%d").to_string(),
                day: date.format("%a").to_string(),
                count: counts.get(&date).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute the dashboard as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary, RepositoryError> {
        let window_start = now - Duration::days(WINDOW_DAYS);
        let today = now.date_naive();
        let series_start = (today - Duration::days(WINDOW_DAYS - 1))
            .and_hms_opt(0, 0, 0)
            .map_or(window_start, |start| start.and_utc());

        let total_revenue: Decimal = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(oi.unit_price * oi.quantity), 0)
            FROM storefront.ordered_items oi
            JOIN storefront.orders o ON o.id = oi.order_id
            WHERE LOWER(o.status) <> 'cancelled'
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let (order_count, user_count, item_count): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT (SELECT COUNT(*) FROM storefront.orders),
                   (SELECT COUNT(*) FROM storefront.users),
                   (SELECT COUNT(*) FROM storefront.items)
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let status_counts: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT LOWER(status) AS status, COUNT(*)
            FROM storefront.orders
            GROUP BY LOWER(status)
            ORDER BY LOWER(status)
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let recent_order_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.orders WHERE created_at >= $1")
                .bind(window_start)
                .fetch_one(self.pool)
                .await?;

        let recent_revenue: Decimal = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(oi.unit_price * oi.quantity), 0)
            FROM storefront.ordered_items oi
            JOIN storefront.orders o ON o.id = oi.order_id
            WHERE o.created_at >= $1 AND LOWER(o.status) <> 'cancelled'
            ",
        )
        .bind(window_start)
        .fetch_one(self.pool)
        .await?;

        let top_items: Vec<TopItem> = sqlx::query_as(
            r"
            SELECT oi.item_id, MAX(oi.item_name) AS name, SUM(oi.quantity)::BIGINT AS quantity
            FROM storefront.ordered_items oi
            GROUP BY oi.item_id
            ORDER BY quantity DESC, oi.item_id
            LIMIT $1
            ",
        )
        .bind(TOP_ITEMS)
        .fetch_all(self.pool)
        .await?;

        let per_day: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day, COUNT(*)
            FROM storefront.orders
            WHERE created_at >= $1
            GROUP BY day
            ",
        )
        .bind(series_start)
        .fetch_all(self.pool)
        .await?;
        let per_day: HashMap<NaiveDate, i64> = per_day.into_iter().collect();

        let low_stock = InventoryRepository::new(self.pool).low_stock().await?;
        let recent_orders = OrderRepository::new(self.pool)
            .recent(RECENT_ORDERS)
            .await?;

        Ok(DashboardSummary {
            total_revenue,
            order_count,
            user_count,
            item_count,
            status_counts,
            recent_order_count,
            recent_revenue,
            low_stock,
            top_items,
            recent_orders,
            daily_orders: daily_series(today, &per_day),
        })
    }
}
