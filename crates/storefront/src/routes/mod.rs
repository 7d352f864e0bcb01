//! HTTP route handlers for the storefront and back-office.
//!
//! # Route Structure
//!
//! ```text
//! # Catalogue
//! GET  /                          - Visible items
//! GET  /search?query=             - Visible items whose name contains the query
//! GET  /item/{id}                 - Item detail
//!
//! # Cart
//! POST /add/{id}                  - Add to cart (form: quantity)
//! GET  /remove/{id}/{quantity}    - Remove units from cart
//! GET  /cart                      - Cart page
//! GET  /cart/count                - {"count": n}
//! POST /api/sync-cart             - Merge local-storage cart into the cookie (guests)
//! GET  /api/get-cart              - Current cart mapping
//!
//! # Accounts
//! GET  /login, POST /login        - Login (migrates the guest cart)
//! GET  /register, POST /register  - Registration
//! GET  /logout                    - Logout (requires auth)
//! GET  /confirm/{token}           - Email confirmation
//! GET  /resend                    - Resend confirmation (requires auth)
//!
//! # Orders and payments
//! GET  /orders                    - Order history (requires auth)
//! POST /create-checkout-session   - Start Stripe Checkout (requires auth)
//! GET  /payment/success           - Return page
//! GET  /payment/failure           - Cancel page
//! POST /stripe-webhook            - Stripe events
//!
//! # Back-office (admin guard)
//! /admin/...                      - See [`admin`]
//! ```

pub mod admin;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use fnuc_core::GuestCart;

use crate::db::{CartRepository, RepositoryError};
use crate::middleware::{GuestCartInput, api_rate_limiter, auth_rate_limiter};
use crate::models::CurrentUser;
use crate::state::AppState;

// =============================================================================
// Page context
// =============================================================================

/// Query parameters carrying a one-shot notice after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// A banner shown at the top of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// CSS modifier: `success` or `error`.
    pub kind: &'static str,
    pub text: &'static str,
}

impl Notice {
    /// Map the redirect codes used across the site to their text.
    #[must_use]
    pub fn from_query(query: &MessageQuery) -> Option<Self> {
        if let Some(code) = query.error.as_deref() {
            let text = match code {
                "credentials" => "Email and password incorrect.",
                "confirm_invalid" => "The confirmation link is invalid or has expired.",
                "session" => "Could not start your session. Please try again.",
                "payments_disabled" => "Payments are currently disabled.",
                _ => "Something went wrong. Please try again.",
            };
            return Some(Self {
                kind: "error",
                text,
            });
        }

        let text = match query.success.as_deref()? {
            "registered" => "Thanks for registering! Check your inbox to confirm your email.",
            "cart_synced" => "Your cart has been synchronized with your account.",
            "confirmed" => "Email address successfully confirmed!",
            "already_confirmed" => "Account already confirmed. Please login.",
            "confirmation_sent" => "Confirmation email sent successfully.",
            "added" => "Item added to your cart.",
            _ => return None,
        };
        Some(Self {
            kind: "success",
            text,
        })
    }
}

/// Data every page layout needs: who is logged in and the cart badge.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub cart_count: i64,
    pub notice: Option<Notice>,
}

impl Page {
    /// Build the layout context, recomputing the cart count.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's cart rows cannot be read.
    pub async fn load(
        state: &AppState,
        user: Option<CurrentUser>,
        guest: &GuestCartInput,
    ) -> Result<Self, RepositoryError> {
        let cart_count = cart_count(state, user.as_ref(), guest).await?;
        Ok(Self {
            user,
            cart_count,
            notice: None,
        })
    }

    /// Attach the notice named by the query string, if any.
    #[must_use]
    pub fn with_notice(mut self, query: &MessageQuery) -> Self {
        self.notice = Notice::from_query(query);
        self
    }

    /// Whether the back-office link should be shown.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}

/// Total units in the visitor's cart.
///
/// Logged-in users count their stored rows; guests count the cookie, or the
/// local-storage snapshot when the cookie is empty.
///
/// # Errors
///
/// Returns an error if the user's cart rows cannot be read.
pub async fn cart_count(
    state: &AppState,
    user: Option<&CurrentUser>,
    guest: &GuestCartInput,
) -> Result<i64, RepositoryError> {
    match user {
        Some(user) => CartRepository::new(state.pool()).total_quantity(user.id).await,
        None => Ok(guest.combined().total_quantity()),
    }
}

/// The visitor's cart as an id → quantity mapping.
///
/// # Errors
///
/// Returns an error if the user's cart rows cannot be read.
pub async fn cart_mapping(
    state: &AppState,
    user: Option<&CurrentUser>,
    guest: &GuestCartInput,
) -> Result<GuestCart, RepositoryError> {
    match user {
        Some(user) => CartRepository::new(state.pool()).as_mapping(user.id).await,
        None => Ok(guest.combined()),
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Login and registration submissions, rate limited per IP.
fn auth_submit_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route_layer(auth_rate_limiter())
}

/// Cart JSON endpoints used by the local-storage mirror.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync-cart", post(api::sync_cart))
        .route("/api/get-cart", get(api::get_cart))
        .route_layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Catalogue
        .route("/", get(home::home))
        .route("/search", get(home::search))
        .route("/item/{id}", get(home::item))
        // Cart
        .route("/add/{id}", post(cart::add))
        .route("/remove/{id}/{quantity}", get(cart::remove))
        .route("/cart", get(cart::show))
        .route("/cart/count", get(cart::count))
        .merge(api_routes())
        // Accounts
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .merge(auth_submit_routes())
        .route("/logout", get(auth::logout))
        .route("/confirm/{token}", get(auth::confirm))
        .route("/resend", get(auth::resend))
        // Orders and payments
        .route("/orders", get(orders::index))
        .route("/create-checkout-session", post(checkout::create_session))
        .route("/payment/success", get(checkout::success))
        .route("/payment/failure", get(checkout::failure))
        .route("/stripe-webhook", post(webhook::stripe_webhook))
        // Back-office
        .merge(admin::routes(state))
}
