//! Development seeding.
//!
//! Runs the same sweep the server runs at startup with `DEV_MODE=true`:
//! missing inventory rows are created, the demo catalogue is inserted into an
//! empty database and a default admin is created when there is none.

use tracing::{info, warn};

use fnuc_storefront::services::seed::{self, DEFAULT_ADMIN_EMAIL};

/// Run the development sweep against the configured database.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a query fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let report = seed::run_development_sweep(&pool).await?;

    info!("Inventory rows backfilled: {}", report.backfilled);
    info!("Demo items inserted: {}", report.seeded_items);
    if report.admin_created {
        warn!(
            "Default admin {} created with a well-known password; change it before going live",
            DEFAULT_ADMIN_EMAIL
        );
    }
    Ok(())
}
