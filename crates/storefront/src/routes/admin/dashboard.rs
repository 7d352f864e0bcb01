//! Back-office dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::db::dashboard::DailyCount;
use crate::db::{DashboardRepository, DashboardSummary};
use crate::error::Result;
use crate::filters;
use crate::state::AppState;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub summary: DashboardSummary,
    /// Largest daily count, used to scale the activity bars.
    pub busiest_day: i64,
}

impl DashboardTemplate {
    /// Bar width for a day, as a percentage of the busiest day.
    #[must_use]
    pub fn bar_percent(&self, day: &DailyCount) -> i64 {
        if self.busiest_day == 0 {
            0
        } else {
            day.count * 100 / self.busiest_day
        }
    }
}

/// Render the dashboard, computed fresh on every request.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Result<DashboardTemplate> {
    let summary = DashboardRepository::new(state.pool())
        .summary(Utc::now())
        .await?;
    let busiest_day = summary
        .daily_orders
        .iter()
        .map(|day| day.count)
        .max()
        .unwrap_or(0);

    Ok(DashboardTemplate {
        summary,
        busiest_day,
    })
}
