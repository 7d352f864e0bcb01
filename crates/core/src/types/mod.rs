//! Core types for Fnuc.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod status;

pub use email::{Email, EmailError, Side};
pub use id::*;
pub use status::{OrderStatus, OrderStatusError};
