//! Login sessions, stored in `PostgreSQL`.
//!
//! A session carries nothing but the logged-in [`CurrentUser`]; the guest
//! cart has its own cookie and never touches the session table.
//!
//! [`CurrentUser`]: crate::models::CurrentUser

use sqlx::PgPool;
use tower_sessions::{
    Expiry, SessionManagerLayer,
    cookie::{SameSite, time::Duration},
};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "fnuc_session";

/// Idle time after which a login expires.
pub const SESSION_IDLE_DAYS: i64 = 7;

/// Session layer over the `tower_sessions.session` table (created by the
/// migrations). Cookies are `Secure` when the public base URL is https.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(PostgresStore::new(pool.clone()))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_IDLE_DAYS)))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
