//! Order status.
//!
//! Order status is free text edited by staff in the back-office (for example
//! `processing`, `shipped`, `cancelled`). Reporting compares statuses
//! case-insensitively, so `Cancelled` and `cancelled` count as the same bucket.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OrderStatus`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStatusError {
    /// The status is empty after trimming.
    #[error("status cannot be empty")]
    Empty,
    /// The status is too long.
    #[error("status must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Status label of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
    /// Maximum length of a status label.
    pub const MAX_LENGTH: usize = 50;

    /// Status given to every order created by fulfillment.
    pub const PROCESSING: &'static str = "processing";

    /// Status excluded from revenue totals.
    pub const CANCELLED: &'static str = "cancelled";

    /// Parse a status label, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the label is empty or longer than 50 characters.
    pub fn parse(s: &str) -> Result<Self, OrderStatusError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OrderStatusError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(OrderStatusError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The initial status of a freshly fulfilled order.
    #[must_use]
    pub fn processing() -> Self {
        Self(Self::PROCESSING.to_owned())
    }

    /// Returns the label exactly as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercased label used for grouping.
    #[must_use]
    pub fn bucket(&self) -> String {
        self.0.to_lowercase()
    }

    /// Whether the order is cancelled (case-insensitive).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::CANCELLED)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // Stored labels are kept verbatim, even if they predate validation.
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let status = OrderStatus::parse("  shipped ").unwrap();
        assert_eq!(status.as_str(), "shipped");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(OrderStatus::parse("   "), Err(OrderStatusError::Empty));
    }

    #[test]
    fn test_parse_rejects_long() {
        let long = "x".repeat(51);
        assert!(matches!(
            OrderStatus::parse(&long),
            Err(OrderStatusError::TooLong { max: 50 })
        ));
    }

    #[test]
    fn test_cancelled_is_case_insensitive() {
        assert!(OrderStatus::parse("Cancelled").unwrap().is_cancelled());
        assert!(OrderStatus::parse("CANCELLED").unwrap().is_cancelled());
        assert!(!OrderStatus::processing().is_cancelled());
    }

    #[test]
    fn test_bucket_lowercases() {
        assert_eq!(OrderStatus::parse("Shipped").unwrap().bucket(), "shipped");
    }
}
