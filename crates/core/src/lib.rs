//! Fnuc Core - Shared domain types and pure storefront logic.
//!
//! This crate provides the pieces used by every Fnuc component:
//! - `storefront` - Public shop and `/admin` back-office (axum server)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Everything here can be unit tested without a server.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email addresses and order status
//! - [`cart`] - Guest cart mapping (cookie / local storage reconciliation)
//! - [`inventory`] - Inventory levels, stock adjustments and audit-log diffing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod inventory;
pub mod types;

pub use cart::GuestCart;
pub use inventory::{
    ChangeType, InventoryLevels, LogEntry, StockAdjustment, StockError, creation_entries,
    update_entries,
};
pub use types::*;
