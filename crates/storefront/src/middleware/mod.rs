//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (`x-request-id`, recorded on the span)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Route-level: rate limiting on auth and API routes, admin guard on `/admin`
//!
//! Extractors: [`RequireAuth`] / [`OptionalAuth`] for the session user and
//! [`GuestCartInput`] for the guest cart cookie and local-storage snapshot.

pub mod admin;
pub mod auth;
pub mod guest_cart;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use admin::{AdminActor, AdminDecision, require_admin};
pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use guest_cart::GuestCartInput;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
