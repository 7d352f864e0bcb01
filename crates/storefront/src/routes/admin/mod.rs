//! Back-office routes.
//!
//! ```text
//! GET       /admin/                         - Dashboard
//! GET       /admin/items                    - Items (JSON when Accept prefers it)
//! GET|POST  /admin/add                      - Add item
//! GET|POST  /admin/edit/item/{id}           - Edit item
//! GET|POST  /admin/edit/order/{id}          - Edit order status
//! GET|POST  /admin/delete/{id}              - Delete item
//! GET       /admin/items/{id}/log           - Audit history
//!
//! GET|POST  /admin/api/items                - List / create
//! PATCH|DELETE /admin/api/items/{id}        - Update / delete
//! POST      /admin/api/items/{id}/stock     - Adjust stock
//! GET       /admin/api/inventory/export     - CSV export
//! ```
//!
//! Every route passes through [`require_admin`].

pub mod api;
pub mod dashboard;
pub mod items;
pub mod payload;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::require_admin;
use crate::state::AppState;

/// Build the back-office router, guarded by the admin check.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard::index))
        .route("/admin/", get(dashboard::index))
        .route("/admin/items", get(items::index))
        .route("/admin/add", get(items::add_page).post(items::add))
        .route(
            "/admin/edit/item/{id}",
            get(items::edit_item_page).post(items::edit_item),
        )
        .route(
            "/admin/edit/order/{id}",
            get(items::edit_order_page).post(items::edit_order),
        )
        .route("/admin/delete/{id}", get(items::delete).post(items::delete))
        .route("/admin/items/{id}/log", get(items::log))
        .route("/admin/api/items", get(api::list_items).post(api::create_item))
        .route(
            "/admin/api/items/{id}",
            patch(api::update_item).delete(api::delete_item),
        )
        .route("/admin/api/items/{id}/stock", post(api::adjust_stock))
        .route("/admin/api/inventory/export", get(api::export_inventory))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ))
}
