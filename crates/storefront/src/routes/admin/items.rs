//! HTML back-office: item list, add/edit forms, order status and audit log.
//!
//! Forms follow the same validation rules as the JSON API. Invalid
//! submissions re-render the form with the entered values and a 400.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::ACCEPT},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use fnuc_core::{InventoryLevels, ItemId, OrderId, OrderStatus};

use super::payload::DEFAULT_IMAGE;
use crate::db::items::NewItem;
use crate::db::{InventoryRepository, ItemRepository, OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::AdminActor;
use crate::models::{InventoryLogRecord, ItemPayload, ItemWithInventory, Order};
use crate::services::{InventoryService, ItemPatch};
use crate::state::AppState;

/// Stock note recorded for items created from the form.
pub const FORM_CREATE_NOTE: &str = "Initial stock on item creation";

/// Note recorded for items deleted from the back-office.
pub const FORM_DELETE_NOTE: &str = "Item deleted via admin.";

/// Longest accepted name or category.
const MAX_LABEL_LENGTH: usize = 50;

/// Whether the caller asked for JSON and not a page.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json") && !accept.contains("text/html"))
}

// =============================================================================
// Item form
// =============================================================================

/// Add/edit item form. Every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub name: String,
    pub price: String,
    pub category: String,
    pub details: String,
    pub price_id: String,
    /// Image path or URL; blank keeps the current (or default) image.
    pub image: String,
    pub stock_quantity: String,
    pub low_stock_threshold: String,
    /// Checkbox: present when ticked.
    pub is_published: Option<String>,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidItem {
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub details: String,
    pub price_id: String,
    pub image: Option<String>,
    pub levels: InventoryLevels,
}

fn required<'a>(value: &'a str, label: &str) -> std::result::Result<&'a str, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{label} is required"));
    }
    Ok(value)
}

fn label(value: &str, name: &str) -> std::result::Result<String, String> {
    let value = required(value, name)?;
    if value.chars().count() > MAX_LABEL_LENGTH {
        return Err(format!("{name} must be at most {MAX_LABEL_LENGTH} characters"));
    }
    Ok(value.to_owned())
}

fn count(value: &str, field: &str) -> std::result::Result<i32, String> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| format!("{field} must be a non-negative integer"))
}

impl ItemForm {
    /// Prefill from a stored item.
    #[must_use]
    pub fn from_row(row: &ItemWithInventory) -> Self {
        let levels = row.levels();
        Self {
            name: row.item.name.clone(),
            price: row.item.price.to_string(),
            category: row.item.category.clone(),
            details: row.item.details.clone(),
            price_id: row.item.price_id.clone(),
            image: String::new(),
            stock_quantity: levels.stock_quantity.to_string(),
            low_stock_threshold: levels.low_stock_threshold.to_string(),
            is_published: levels.is_published.then(|| "on".to_owned()),
        }
    }

    /// Blank form for a new item: no stock, published.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            stock_quantity: "0".to_owned(),
            low_stock_threshold: "0".to_owned(),
            is_published: Some("on".to_owned()),
            ..Self::default()
        }
    }

    /// Whether the published box is ticked.
    #[must_use]
    pub fn published(&self) -> bool {
        self.is_published.is_some()
    }

    /// Check the form, returning the first problem as a message.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first invalid field.
    pub fn validate(&self) -> std::result::Result<ValidItem, String> {
        let name = label(&self.name, "Name")?;
        let price = Decimal::from_str(required(&self.price, "Price")?)
            .ok()
            .filter(|p| !p.is_sign_negative())
            .ok_or_else(|| "price must be a non-negative number".to_owned())?;
        let category = label(&self.category, "Category")?;
        let details = required(&self.details, "Details")?.to_owned();
        let price_id = required(&self.price_id, "Stripe id")?.to_owned();
        let stock_quantity = count(required(&self.stock_quantity, "Stock quantity")?, "stock_quantity")?;
        let low_stock_threshold = match self.low_stock_threshold.trim() {
            "" => 0,
            raw => count(raw, "low_stock_threshold")?,
        };
        let image = Some(self.image.trim())
            .filter(|i| !i.is_empty())
            .map(str::to_owned);

        Ok(ValidItem {
            name,
            price,
            category,
            details,
            price_id,
            image,
            levels: InventoryLevels {
                stock_quantity,
                low_stock_threshold,
                is_published: self.published(),
            },
        })
    }
}

impl ValidItem {
    fn into_new_item(self) -> (NewItem, InventoryLevels) {
        (
            NewItem {
                name: self.name,
                price: self.price,
                category: self.category,
                image: self.image.unwrap_or_else(|| DEFAULT_IMAGE.to_owned()),
                details: self.details,
                price_id: self.price_id,
            },
            self.levels,
        )
    }

    fn into_patch(self) -> ItemPatch {
        ItemPatch {
            name: Some(self.name),
            price: Some(self.price),
            category: Some(self.category),
            details: Some(self.details),
            price_id: Some(self.price_id),
            image: self.image,
            stock_quantity: Some(self.levels.stock_quantity),
            low_stock_threshold: Some(self.levels.low_stock_threshold),
            is_published: Some(self.levels.is_published),
            note: None,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Item table.
#[derive(Template, WebTemplate)]
#[template(path = "admin/items.html")]
pub struct ItemsTemplate {
    pub items: Vec<ItemPayload>,
}

/// Add or edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/item_form.html")]
pub struct ItemFormTemplate {
    pub title: String,
    pub action: String,
    pub submit: &'static str,
    pub form: ItemForm,
    pub error: Option<String>,
}

/// Order status form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/order_form.html")]
pub struct OrderFormTemplate {
    pub order: Order,
    pub status: String,
    pub error: Option<String>,
}

/// Audit history of one item.
#[derive(Template, WebTemplate)]
#[template(path = "admin/item_log.html")]
pub struct ItemLogTemplate {
    pub item_id: ItemId,
    /// `None` once the item has been deleted.
    pub item_name: Option<String>,
    pub entries: Vec<InventoryLogRecord>,
}

fn rejected(template: impl IntoResponse) -> Response {
    (StatusCode::BAD_REQUEST, template).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Item list: JSON for API clients, a table for browsers.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let rows = ItemRepository::new(state.pool()).list_with_inventory().await?;
    let items: Vec<ItemPayload> = rows.iter().map(ItemPayload::from).collect();

    if wants_json(&headers) {
        return Ok(Json(items).into_response());
    }
    Ok(ItemsTemplate { items }.into_response())
}

fn add_form(form: ItemForm, error: Option<String>) -> ItemFormTemplate {
    ItemFormTemplate {
        title: "Add item".to_owned(),
        action: "/admin/add".to_owned(),
        submit: "Add",
        form,
        error,
    }
}

fn edit_form(id: ItemId, form: ItemForm, error: Option<String>) -> ItemFormTemplate {
    ItemFormTemplate {
        title: format!("Edit item #{id}"),
        action: format!("/admin/edit/item/{id}"),
        submit: "Update",
        form,
        error,
    }
}

/// Empty add form.
pub async fn add_page() -> ItemFormTemplate {
    add_form(ItemForm::blank(), None)
}

/// Create an item from the add form.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Form(form): Form<ItemForm>,
) -> Result<Response> {
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(message) => return Ok(rejected(add_form(form, Some(message)))),
    };

    let (new, levels) = valid.into_new_item();
    InventoryService::new(state.pool())
        .create_item(&new, levels, FORM_CREATE_NOTE, actor.user_id())
        .await?;
    Ok(Redirect::to("/admin/items").into_response())
}

/// Edit form prefilled from the item. Creates a missing inventory row.
#[instrument(skip(state))]
pub async fn edit_item_page(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<ItemFormTemplate> {
    let id = ItemId::new(id);
    let mut row = ItemRepository::new(state.pool())
        .get_with_inventory(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_owned()))?;
    if row.inventory.is_none() {
        row.inventory = Some(InventoryRepository::new(state.pool()).get_or_create(id).await?);
    }

    Ok(edit_form(id, ItemForm::from_row(&row), None))
}

/// Apply the edit form, logging every changed field.
#[instrument(skip(state, actor, form))]
pub async fn edit_item(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<i32>,
    Form(form): Form<ItemForm>,
) -> Result<Response> {
    let id = ItemId::new(id);
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(message) => return Ok(rejected(edit_form(id, form, Some(message)))),
    };

    InventoryService::new(state.pool())
        .update_item(id, &valid.into_patch(), actor.user_id())
        .await?;
    Ok(Redirect::to("/admin/items").into_response())
}

/// Order status form.
#[derive(Debug, Default, Deserialize)]
pub struct OrderForm {
    #[serde(default)]
    pub status: String,
}

async fn load_order(state: &AppState, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
}

/// Order status form prefilled with the current status.
#[instrument(skip(state))]
pub async fn edit_order_page(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<OrderFormTemplate> {
    let order = load_order(&state, OrderId::new(id)).await?;
    Ok(OrderFormTemplate {
        status: order.status.as_str().to_owned(),
        order,
        error: None,
    })
}

/// Replace an order's status, then return to the dashboard.
#[instrument(skip(state, form))]
pub async fn edit_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<OrderForm>,
) -> Result<Response> {
    let id = OrderId::new(id);
    let status = match OrderStatus::parse(&form.status) {
        Ok(status) => status,
        Err(e) => {
            let order = load_order(&state, id).await?;
            return Ok(rejected(OrderFormTemplate {
                order,
                status: form.status,
                error: Some(format!("Order {e}")),
            }));
        }
    };

    OrderRepository::new(state.pool())
        .update_status(id, &status)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Order not found".to_owned()),
            other => other.into(),
        })?;
    info!(order_id = %id, status = %status.as_str(), "Order status changed");
    Ok(Redirect::to("/admin/").into_response())
}

/// Delete an item from the back-office.
#[instrument(skip(state, actor))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    InventoryService::new(state.pool())
        .delete_item(ItemId::new(id), actor.user_id(), FORM_DELETE_NOTE)
        .await?;
    Ok(Redirect::to("/admin/items"))
}

/// Audit history of an item, including deleted ones.
#[instrument(skip(state))]
pub async fn log(State(state): State<AppState>, Path(id): Path<i32>) -> Result<ItemLogTemplate> {
    let id = ItemId::new(id);
    let entries = InventoryRepository::new(state.pool()).history(id).await?;
    let item_name = ItemRepository::new(state.pool())
        .get(id)
        .await?
        .map(|item| item.name);

    Ok(ItemLogTemplate {
        item_id: id,
        item_name,
        entries,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn filled() -> ItemForm {
        ItemForm {
            name: "Mi Smart Band 5".to_owned(),
            price: "34.99".to_owned(),
            category: "Wearables".to_owned(),
            details: "AMOLED display<br>14-day battery".to_owned(),
            price_id: "price_1HbandX".to_owned(),
            image: String::new(),
            stock_quantity: "25".to_owned(),
            low_stock_threshold: String::new(),
            is_published: None,
        }
    }

    #[test]
    fn test_valid_form() {
        let valid = filled().validate().unwrap();
        assert_eq!(valid.price, Decimal::new(3499, 2));
        assert_eq!(valid.image, None);
        assert_eq!(
            valid.levels,
            InventoryLevels {
                stock_quantity: 25,
                low_stock_threshold: 0,
                is_published: false,
            }
        );

        let (new, _) = valid.into_new_item();
        assert_eq!(new.image, DEFAULT_IMAGE);
    }

    #[test]
    fn test_form_rejections() {
        let mut form = filled();
        form.name = "   ".to_owned();
        assert_eq!(form.validate().unwrap_err(), "Name is required");

        let mut form = filled();
        form.category = "x".repeat(51);
        assert_eq!(
            form.validate().unwrap_err(),
            "Category must be at most 50 characters"
        );

        let mut form = filled();
        form.price = "-1".to_owned();
        assert_eq!(
            form.validate().unwrap_err(),
            "price must be a non-negative number"
        );

        let mut form = filled();
        form.stock_quantity = "-4".to_owned();
        assert_eq!(
            form.validate().unwrap_err(),
            "stock_quantity must be a non-negative integer"
        );

        let mut form = filled();
        form.low_stock_threshold = "few".to_owned();
        assert_eq!(
            form.validate().unwrap_err(),
            "low_stock_threshold must be a non-negative integer"
        );
    }

    #[test]
    fn test_edit_patch_keeps_image_when_blank() {
        let patch = filled().validate().unwrap().into_patch();
        assert_eq!(patch.image, None);
        assert_eq!(patch.stock_quantity, Some(25));
        assert_eq!(patch.is_published, Some(false));
    }

    #[test]
    fn test_blank_form_is_published() {
        let form = ItemForm::blank();
        assert!(form.published());
        assert_eq!(form.stock_quantity, "0");
    }

    #[test]
    fn test_wants_json() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(wants_json(&headers));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9"),
        );
        assert!(!wants_json(&headers));
    }
}
