//! Catalogue pages: home, search and item detail.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use fnuc_core::ItemId;

use super::{MessageQuery, Page};
use crate::db::ItemRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{GuestCartInput, OptionalAuth};
use crate::models::{Item, ItemWithInventory};
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Catalogue listing, used for the home page and search results.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: Page,
    pub items: Vec<Item>,
    /// The search text, when this is a results page.
    pub query: Option<String>,
}

/// Item detail page.
#[derive(Template, WebTemplate)]
#[template(path = "item.html")]
pub struct ItemTemplate {
    pub page: Page,
    pub item: Item,
    pub details: Vec<String>,
    pub in_stock: bool,
}

/// Split stored details into display lines; `<br>` separates lines.
fn detail_lines(details: &str) -> Vec<String> {
    details
        .split("<br>")
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

fn items_of(rows: Vec<ItemWithInventory>) -> Vec<Item> {
    rows.into_iter().map(|row| row.item).collect()
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Query(message): Query<MessageQuery>,
) -> Result<HomeTemplate> {
    let items = ItemRepository::new(state.pool()).list_visible().await?;
    let page = Page::load(&state, user, &guest).await?.with_notice(&message);

    Ok(HomeTemplate {
        page,
        items: items_of(items),
        query: None,
    })
}

/// Display search results.
#[instrument(skip(state, user, guest))]
pub async fn search(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Query(search): Query<SearchQuery>,
) -> Result<HomeTemplate> {
    let items = ItemRepository::new(state.pool())
        .search_visible(&search.query)
        .await?;
    let page = Page::load(&state, user, &guest).await?;

    Ok(HomeTemplate {
        page,
        items: items_of(items),
        query: Some(search.query),
    })
}

/// Display one item. Unpublished items are not found.
#[instrument(skip(state, user, guest))]
pub async fn item(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Path(id): Path<i32>,
) -> Result<ItemTemplate> {
    let row = ItemRepository::new(state.pool())
        .get_with_inventory(ItemId::new(id))
        .await?
        .filter(ItemWithInventory::is_visible)
        .ok_or_else(|| AppError::NotFound("Item not found".to_owned()))?;
    let page = Page::load(&state, user, &guest).await?;

    let in_stock = row.inventory.is_none_or(|inv| inv.stock_quantity > 0);
    Ok(ItemTemplate {
        page,
        details: detail_lines(&row.item.details),
        item: row.item,
        in_stock,
    })
}
