//! Integer primary keys, one type per table.
//!
//! A `UserId` cannot be passed where an `ItemId` is expected, even though
//! both are `SERIAL` columns underneath.

/// Declares an `i32` primary-key newtype.
///
/// The type serializes as a bare number, orders by value and prints with
/// `Display`. Behind the `postgres` feature it binds and decodes as
/// `INTEGER` in sqlx queries.
///
/// ```rust
/// # use fnuc_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(ShelfId);
///
/// let warehouse = WarehouseId::new(3);
/// assert_eq!(warehouse.as_i32(), 3);
/// // let shelf: ShelfId = warehouse; // mismatched types
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw key.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw key, for binding or formatting.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Entity IDs used across the storefront
define_id!(UserId);
define_id!(ItemId);
define_id!(OrderId);
define_id!(InventoryLogId);

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    /// Parse an item id from its string form (cart mappings key items by string).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ItemId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: ItemId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_item_id_from_str() {
        assert_eq!(" 7 ".parse::<ItemId>().unwrap(), ItemId::new(7));
        assert!("seven".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_ids_order_by_value() {
        let mut ids = vec![ItemId::new(5), ItemId::new(3), ItemId::new(9)];
        ids.sort();
        assert_eq!(ids, vec![ItemId::new(3), ItemId::new(5), ItemId::new(9)]);
    }
}
