//! Inventory JSON API for back-office integrations.
//!
//! Token callers are recorded as anonymous in the audit log; admin sessions
//! are recorded by user id. Every error renders as `{"error": "..."}`.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use fnuc_core::ItemId;

use super::payload::{self, CreateRequest};
use crate::db::{InventoryRepository, ItemRepository};
use crate::error::{ApiError, ApiResult, AppError};
use crate::middleware::AdminActor;
use crate::models::{ItemPayload, ItemWithInventory};
use crate::services::InventoryService;
use crate::state::AppState;

/// Note recorded when an item is deleted through the API.
pub const API_DELETE_NOTE: &str = "Item deleted via API.";

/// Response of `DELETE /admin/api/items/{id}`.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub status: &'static str,
    pub id: ItemId,
}

/// List every item with its inventory levels.
#[instrument(skip_all)]
pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<ItemPayload>>> {
    let rows = ItemRepository::new(state.pool()).list_with_inventory().await?;
    Ok(Json(rows.iter().map(ItemPayload::from).collect()))
}

/// Create an item with its inventory.
#[instrument(skip_all)]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ItemPayload>)> {
    let CreateRequest { item, levels, note } = payload::parse_create(&payload::object(&body)?)?;

    let created = InventoryService::new(state.pool())
        .create_item(&item, levels, &note, actor.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(ItemPayload::from(&created))))
}

/// Partially update an item. Nothing is written if any field is invalid.
#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<i32>,
    body: Bytes,
) -> ApiResult<Json<ItemPayload>> {
    let patch = payload::parse_patch(&payload::object(&body)?)?;

    let updated = InventoryService::new(state.pool())
        .update_item(ItemId::new(id), &patch, actor.user_id())
        .await?;
    Ok(Json(ItemPayload::from(&updated)))
}

/// Delete an item, keeping its audit history.
#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Deleted>> {
    let item = InventoryService::new(state.pool())
        .delete_item(ItemId::new(id), actor.user_id(), API_DELETE_NOTE)
        .await?;
    Ok(Json(Deleted {
        status: "deleted",
        id: item.id,
    }))
}

/// Change an item's stock by `delta` or to an exact `quantity`.
#[instrument(skip(state, body))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<i32>,
    body: Bytes,
) -> ApiResult<Json<ItemPayload>> {
    let (adjustment, note) = payload::parse_adjustment(&payload::object(&body)?)?;

    let adjusted = InventoryService::new(state.pool())
        .adjust_stock(ItemId::new(id), adjustment, note.as_deref(), actor.user_id())
        .await?;
    Ok(Json(ItemPayload::from(&adjusted)))
}

/// Render rows as the inventory CSV export.
///
/// # Errors
///
/// Returns an error if a record cannot be written.
pub fn inventory_csv(rows: &[ItemWithInventory]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "name",
        "price",
        "stock_quantity",
        "low_stock_threshold",
        "is_published",
    ])?;
    for row in rows {
        let levels = row.levels();
        writer.write_record([
            row.item.id.to_string(),
            row.item.name.clone(),
            row.item.price.to_string(),
            levels.stock_quantity.to_string(),
            levels.low_stock_threshold.to_string(),
            levels.is_published.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Download every item's inventory as CSV. Missing inventory rows are
/// created first so the export is complete.
#[instrument(skip_all)]
pub async fn export_inventory(State(state): State<AppState>) -> ApiResult<Response> {
    let created = InventoryRepository::new(state.pool()).backfill_missing().await?;
    if created > 0 {
        tracing::info!(created, "Backfilled inventory before export");
    }

    let rows = ItemRepository::new(state.pool()).list_with_inventory().await?;
    let body = inventory_csv(&rows).map_err(|e| {
        ApiError(AppError::Internal(format!("CSV export failed: {e}")))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=inventory.csv"),
        ],
        body,
    )
        .into_response())
}
