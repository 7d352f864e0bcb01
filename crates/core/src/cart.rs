//! Guest cart mapping.
//!
//! A visitor who has not logged in keeps their cart client-side: the server
//! writes it to a `cart` cookie and the browser mirrors it in local storage.
//! Both carry the same JSON shape, an object from item id (as a string) to a
//! positive quantity:
//!
//! ```json
//! {"3": 2, "5": 1}
//! ```
//!
//! [`GuestCart`] holds that mapping and implements the reconciliation rules:
//!
//! - Reading: the cookie wins when it is non-empty, otherwise the local-storage
//!   snapshot is used ([`GuestCart::combined`]).
//! - Writing: after an add or remove, the cookie mapping is merged with the
//!   snapshot (if any) before being written back ([`GuestCart::merge`]).
//! - Quantities are always positive; anything that drops to zero or below is
//!   removed from the mapping.
//!
//! Client data is untrusted. [`GuestCart::parse_lenient`] never fails: a
//! document that is not a JSON object yields an empty cart, and individual
//! entries with a non-numeric key or a non-positive quantity are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ItemId;

/// A guest cart: item id to positive quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestCart(BTreeMap<ItemId, i32>);

impl GuestCart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse client-supplied JSON, treating anything malformed as empty.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        let Ok(Value::Object(entries)) = serde_json::from_str::<Value>(raw) else {
            return Self::new();
        };

        let mut cart = Self::new();
        for (key, value) in entries {
            let Ok(item_id) = key.parse::<ItemId>() else {
                continue;
            };
            if let Some(quantity) = quantity_from_json(&value) {
                cart.add(item_id, quantity);
            }
        }
        cart
    }

    /// Returns true when the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Quantity for one item, if present.
    #[must_use]
    pub fn get(&self, item_id: ItemId) -> Option<i32> {
        self.0.get(&item_id).copied()
    }

    /// Iterate over `(item id, quantity)` pairs in item id order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, i32)> + '_ {
        self.0.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Sum of all quantities, used for the cart badge.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.0.values().map(|qty| i64::from(*qty)).sum()
    }

    /// Increment (or initialise) the quantity of an item.
    ///
    /// A result of zero or less removes the entry.
    pub fn add(&mut self, item_id: ItemId, delta: i32) {
        let current = self.0.get(&item_id).copied().unwrap_or(0);
        self.set(item_id, current.saturating_add(delta));
    }

    /// Decrement the quantity of an item that is already in the cart.
    ///
    /// Removing at least the current quantity deletes the entry. Items not in
    /// the cart are left alone.
    pub fn remove(&mut self, item_id: ItemId, quantity: i32) {
        if let Some(current) = self.0.get(&item_id).copied() {
            self.set(item_id, current.saturating_sub(quantity));
        }
    }

    /// Additive merge: every key from either side, quantities summed.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (item_id, quantity) in other.iter() {
            merged.add(item_id, quantity);
        }
        merged
    }

    /// The cart to display: the cookie if it is non-empty, else local storage.
    #[must_use]
    pub fn combined(cookie: Self, local: Self) -> Self {
        if cookie.is_empty() { local } else { cookie }
    }

    /// Apply the write-back rule: merge with the local-storage snapshot if one
    /// was supplied.
    #[must_use]
    pub fn with_local_snapshot(self, local: &Self) -> Self {
        if local.is_empty() {
            self
        } else {
            self.merge(local)
        }
    }

    /// Serialize to the compact JSON stored in the cookie.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A map of integers to integers always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }

    fn set(&mut self, item_id: ItemId, quantity: i32) {
        if quantity > 0 {
            self.0.insert(item_id, quantity);
        } else {
            self.0.remove(&item_id);
        }
    }
}

/// Accept integers, integral floats and numeric strings; reject the rest.
fn quantity_from_json(value: &Value) -> Option<i32> {
    let quantity = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < f64::from(i32::MAX))
                .map(integral_f64_to_i64)
        })?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    i32::try_from(quantity).ok().filter(|q| *q > 0)
}

#[allow(clippy::cast_possible_truncation)] // callers check the value is integral and in range
fn integral_f64_to_i64(f: f64) -> i64 {
    f as i64
}

impl FromIterator<(ItemId, i32)> for GuestCart {
    fn from_iter<T: IntoIterator<Item = (ItemId, i32)>>(iter: T) -> Self {
        let mut cart = Self::new();
        for (item_id, quantity) in iter {
            cart.add(item_id, quantity);
        }
        cart
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cart(pairs: &[(i32, i32)]) -> GuestCart {
        pairs
            .iter()
            .map(|(id, qty)| (ItemId::new(*id), *qty))
            .collect()
    }

    #[test]
    fn test_parse_valid_object() {
        let parsed = GuestCart::parse_lenient(r#"{"3": 2, "5": 1}"#);
        assert_eq!(parsed, cart(&[(3, 2), (5, 1)]));
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(GuestCart::parse_lenient("").is_empty());
        assert!(GuestCart::parse_lenient("not json").is_empty());
        assert!(GuestCart::parse_lenient("[1, 2, 3]").is_empty());
        assert!(GuestCart::parse_lenient(r#"{"3": 2"#).is_empty());
    }

    #[test]
    fn test_parse_skips_bad_entries() {
        let parsed = GuestCart::parse_lenient(
            r#"{"3": 2, "abc": 4, "5": 0, "6": -2, "7": "3", "8": 1.5, "9": null, "10": 2.0}"#,
        );
        assert_eq!(parsed, cart(&[(3, 2), (7, 3), (10, 2)]));
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let a = cart(&[(3, 2), (5, 1)]);
        assert_eq!(a.merge(&GuestCart::new()), a);
        assert_eq!(GuestCart::new().merge(&a), a);
    }

    #[test]
    fn test_merge_is_commutative_and_sums() {
        let a = cart(&[(1, 2), (2, 1)]);
        let b = cart(&[(2, 4), (3, 7)]);

        let ab = a.merge(&b);
        let ba = b.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab, cart(&[(1, 2), (2, 5), (3, 7)]));
    }

    #[test]
    fn test_add_initialises_and_increments() {
        let mut c = GuestCart::new();
        c.add(ItemId::new(4), 1);
        c.add(ItemId::new(4), 2);
        assert_eq!(c.get(ItemId::new(4)), Some(3));
    }

    #[test]
    fn test_remove_less_than_quantity_keeps_entry() {
        let mut c = cart(&[(3, 5)]);
        c.remove(ItemId::new(3), 2);
        assert_eq!(c.get(ItemId::new(3)), Some(3));
    }

    #[test]
    fn test_remove_at_least_quantity_deletes_entry() {
        let mut exact = cart(&[(3, 2), (5, 1)]);
        exact.remove(ItemId::new(3), 2);
        assert_eq!(exact.get(ItemId::new(3)), None);

        let mut more = cart(&[(3, 2)]);
        more.remove(ItemId::new(3), 10);
        assert!(more.is_empty());
    }

    #[test]
    fn test_remove_missing_item_is_noop() {
        let mut c = cart(&[(3, 2)]);
        c.remove(ItemId::new(9), 1);
        assert_eq!(c, cart(&[(3, 2)]));
    }

    #[test]
    fn test_combined_prefers_non_empty_cookie() {
        let cookie = cart(&[(1, 1)]);
        let local = cart(&[(2, 2)]);
        assert_eq!(GuestCart::combined(cookie.clone(), local.clone()), cookie);
        assert_eq!(GuestCart::combined(GuestCart::new(), local.clone()), local);
    }

    #[test]
    fn test_with_local_snapshot_merges_only_when_present() {
        let cookie = cart(&[(1, 1)]);
        assert_eq!(cookie.clone().with_local_snapshot(&GuestCart::new()), cookie);
        assert_eq!(
            cookie.with_local_snapshot(&cart(&[(1, 2), (4, 1)])),
            cart(&[(1, 3), (4, 1)])
        );
    }

    #[test]
    fn test_total_quantity() {
        assert_eq!(cart(&[(1, 2), (2, 3)]).total_quantity(), 5);
        assert_eq!(GuestCart::new().total_quantity(), 0);
    }

    #[test]
    fn test_json_uses_string_keys() {
        let c = cart(&[(3, 2), (5, 1)]);
        assert_eq!(c.to_json(), r#"{"3":2,"5":1}"#);
        assert_eq!(GuestCart::parse_lenient(&c.to_json()), c);
    }
}
