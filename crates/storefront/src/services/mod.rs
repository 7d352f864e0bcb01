//! Business logic services for the storefront.
//!
//! Services own transactions: they open one, call the `*_tx` repository
//! helpers, and commit. Handlers call services for anything that writes more
//! than one row.
//!
//! # Services
//!
//! - `auth` - Password registration and login
//! - `confirmation` - Signed email-confirmation tokens
//! - `mail` - Transactional email behind the `Mailer` trait
//! - `cart` - Guest cart migration at login
//! - `fulfillment` - Idempotent order creation from a paid checkout
//! - `inventory` - Item/stock mutations with audit logging
//! - `stripe` - Checkout sessions and webhook signature checks
//! - `seed` - Development database sweep

pub mod auth;
pub mod cart;
pub mod confirmation;
pub mod fulfillment;
pub mod inventory;
pub mod mail;
pub mod seed;
pub mod stripe;

pub use auth::{AuthError, AuthService};
pub use cart::CartService;
pub use fulfillment::{Fulfillment, FulfillmentError, FulfillmentService};
pub use inventory::{InventoryError, InventoryService, ItemPatch};
pub use mail::{LogMailer, MailError, Mailer, SmtpMailer};
pub use stripe::{StripeClient, StripeError};
