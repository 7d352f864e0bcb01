//! Order history.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use super::Page;
use crate::db::OrderRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{GuestCartInput, RequireAuth};
use crate::models::Order;
use crate::state::AppState;

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders.html")]
pub struct OrdersTemplate {
    pub page: Page,
    pub orders: Vec<Order>,
}

/// List the user's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestCartInput,
) -> Result<OrdersTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    let page = Page::load(&state, Some(user), &guest).await?;
    Ok(OrdersTemplate { page, orders })
}
