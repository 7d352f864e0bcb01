//! Order fulfillment after a completed payment.
//!
//! Fulfillment is keyed by the payment session id. The order row is inserted
//! first with `ON CONFLICT DO NOTHING`, so a redelivered webhook finds the
//! session already taken and stops before touching the cart.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use fnuc_core::{OrderId, UserId};

use crate::db::carts::{lock_lines_tx, subtract_tx};
use crate::db::orders::{insert_if_new_tx, insert_line_tx};
use crate::db::{RepositoryError, UserRepository};

/// Errors that can occur while fulfilling an order.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The purchaser does not exist.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Result of a fulfillment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fulfillment {
    /// A new order was created from the cart.
    Fulfilled(OrderId),
    /// The payment session had already produced an order.
    AlreadyFulfilled,
}

/// Fulfillment service.
pub struct FulfillmentService<'a> {
    pool: &'a PgPool,
}

impl<'a> FulfillmentService<'a> {
    /// Create a new fulfillment service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order for `payment_session_id`.
    ///
    /// Every cart row becomes a line item (with the item's current name and
    /// price frozen) and is subtracted from the cart. Either all of it
    /// happens or none of it does.
    ///
    /// # Errors
    ///
    /// Returns `FulfillmentError::UnknownUser` if the user does not exist.
    /// Returns `FulfillmentError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn fulfill(
        &self,
        user_id: UserId,
        payment_session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Fulfillment, FulfillmentError> {
        if UserRepository::new(self.pool).get_by_id(user_id).await?.is_none() {
            return Err(FulfillmentError::UnknownUser(user_id));
        }

        let mut tx = self.pool.begin().await?;

        let Some(order_id) = insert_if_new_tx(&mut tx, user_id, payment_session_id, now).await?
        else {
            info!(user_id = %user_id, "Payment session already fulfilled");
            return Ok(Fulfillment::AlreadyFulfilled);
        };

        let lines = lock_lines_tx(&mut tx, user_id).await?;
        for line in &lines {
            insert_line_tx(&mut tx, order_id, line).await?;
            subtract_tx(&mut tx, user_id, line.item_id, line.quantity).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            user_id = %user_id,
            lines = lines.len(),
            "Order fulfilled"
        );
        Ok(Fulfillment::Fulfilled(order_id))
    }
}
