//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! in [`crate::db`].

pub mod item;
pub mod order;
pub mod session;
pub mod user;

pub use item::{InventoryLogRecord, Item, ItemPayload, ItemWithInventory};
pub use order::{CartLine, Order, OrderLine};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
