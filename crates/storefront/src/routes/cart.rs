//! Cart route handlers.
//!
//! Logged-in users keep their cart in the database; guests keep it in the
//! `cart` cookie, mirrored in local storage by `static/js/cart.js`.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fnuc_core::{GuestCart, ItemId};

use super::{MessageQuery, Page};
use crate::db::{CartRepository, ItemRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::guest_cart::{GuestCartInput, cart_cookie, with_cookie};
use crate::middleware::OptionalAuth;
use crate::models::{CartLine, CurrentUser};
use crate::state::AppState;

/// Add to cart form data.
#[derive(Debug, Default, Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<String>,
}

/// Cart count response.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart.html")]
pub struct CartTemplate {
    pub page: Page,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub payments_enabled: bool,
}

/// Quantity from the add form: absent or blank means one.
fn parse_quantity(raw: Option<&str>) -> Result<i32> {
    match raw.map(str::trim).filter(|q| !q.is_empty()) {
        None => Ok(1),
        Some(q) => q
            .parse::<i32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::BadRequest("Quantity must be a positive integer".to_owned())),
    }
}

/// Guest cart lines with item details, skipping items that no longer exist.
async fn guest_lines(state: &AppState, cart: &GuestCart) -> Result<Vec<CartLine>> {
    if cart.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<ItemId> = cart.iter().map(|(id, _)| id).collect();
    let items: HashMap<ItemId, _> = ItemRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    Ok(cart
        .iter()
        .filter_map(|(id, quantity)| {
            items.get(&id).map(|item| CartLine {
                item_id: item.id,
                name: item.name.clone(),
                price: item.price,
                image: item.image.clone(),
                price_id: item.price_id.clone(),
                quantity,
            })
        })
        .collect())
}

async fn lines_for(
    state: &AppState,
    user: Option<&CurrentUser>,
    guest: &GuestCartInput,
) -> Result<Vec<CartLine>> {
    match user {
        Some(user) => Ok(CartRepository::new(state.pool()).lines(user.id).await?),
        None => guest_lines(state, &guest.combined()).await,
    }
}

/// Display the cart page.
#[instrument(skip(state, user, guest, query))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    axum::extract::Query(query): axum::extract::Query<MessageQuery>,
) -> Result<CartTemplate> {
    let lines = lines_for(&state, user.as_ref(), &guest).await?;
    let total = lines.iter().map(CartLine::line_total).sum();
    let page = Page::load(&state, user, &guest).await?.with_notice(&query);

    Ok(CartTemplate {
        page,
        lines,
        total,
        payments_enabled: state.stripe().is_some(),
    })
}

/// Add units of an item to the cart, then go back to the catalogue.
#[instrument(skip(state, user, guest, form))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Path(id): Path<i32>,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let item_id = ItemId::new(id);
    let quantity = parse_quantity(form.quantity.as_deref())?;

    if let Some(user) = user {
        CartRepository::new(state.pool())
            .add(user.id, item_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("Item not found".to_owned()),
                other => other.into(),
            })?;
        add_breadcrumb("cart", "Added item", Some(&[("item_id", id.to_string().as_str())]));
        return Ok(Redirect::to("/?success=added").into_response());
    }

    if ItemRepository::new(state.pool()).get(item_id).await?.is_none() {
        return Err(AppError::NotFound("Item not found".to_owned()));
    }

    let cart = guest.write_back(|cart| cart.add(item_id, quantity));
    Ok(with_cookie(
        Redirect::to("/?success=added"),
        cart_cookie(&cart),
    ))
}

/// Remove units of an item, then show the cart.
#[instrument(skip(state, user, guest))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Path((id, quantity)): Path<(i32, i32)>,
) -> Result<Response> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "Quantity must be a positive integer".to_owned(),
        ));
    }
    let item_id = ItemId::new(id);

    if let Some(user) = user {
        CartRepository::new(state.pool())
            .remove(user.id, item_id, quantity)
            .await?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let cart = guest.write_back(|cart| cart.remove(item_id, quantity));
    Ok(with_cookie(Redirect::to("/cart"), cart_cookie(&cart)))
}

/// Number of units in the cart, as JSON.
#[instrument(skip(state, user, guest))]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
) -> Result<Json<CartCount>> {
    let count = super::cart_count(&state, user.as_ref(), &guest).await?;
    Ok(Json(CartCount { count }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::{body_json, empty, request};
    use crate::services::LogMailer;
    use crate::state::tests::test_state;

    fn app() -> axum::Router {
        let state = test_state(Arc::new(LogMailer));
        crate::routes::routes(&state).with_state(state)
    }

    fn set_cookie(response: &Response) -> String {
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None).unwrap(), 1);
        assert_eq!(parse_quantity(Some("  ")).unwrap(), 1);
        assert_eq!(parse_quantity(Some("3")).unwrap(), 3);
        assert!(parse_quantity(Some("0")).is_err());
        assert!(parse_quantity(Some("-2")).is_err());
        assert!(parse_quantity(Some("two")).is_err());
    }

    #[tokio::test]
    async fn test_count_for_guest_uses_cookie() {
        let response = app()
            .oneshot(
                request("GET", "/cart/count")
                    .header(header::COOKIE, "cart=%7B%223%22%3A2%2C%225%22%3A1%7D")
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"count": 3}));
    }

    #[tokio::test]
    async fn test_count_falls_back_to_local_storage() {
        let response = app()
            .oneshot(
                request("GET", "/cart/count")
                    .header("x-cart-localstorage", r#"{"7":4}"#)
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"count": 4}));
    }

    #[tokio::test]
    async fn test_count_empty_cart() {
        let response = app()
            .oneshot(request("GET", "/cart/count").body(empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"count": 0}));
    }

    #[tokio::test]
    async fn test_guest_remove_rewrites_cookie() {
        let response = app()
            .oneshot(
                request("GET", "/remove/3/1")
                    .header(header::COOKIE, "cart=%7B%223%22%3A2%7D")
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/cart");
        assert!(set_cookie(&response).starts_with("cart=%7B%223%22%3A1%7D"));
    }

    #[tokio::test]
    async fn test_guest_remove_merges_local_snapshot() {
        let response = app()
            .oneshot(
                request("GET", "/remove/3/2")
                    .header(header::COOKIE, "cart=%7B%223%22%3A2%7D")
                    .header("x-cart-localstorage", r#"{"5":1}"#)
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(set_cookie(&response).starts_with("cart=%7B%225%22%3A1%7D"));
    }

    #[tokio::test]
    async fn test_guest_remove_decrements_cookie_before_merging() {
        let response = app()
            .oneshot(
                request("GET", "/remove/3/3")
                    .header(header::COOKIE, "cart=%7B%223%22%3A2%7D")
                    .header("x-cart-localstorage", r#"{"3":5}"#)
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(set_cookie(&response).starts_with("cart=%7B%223%22%3A5%7D"));

        let response = app()
            .oneshot(
                request("GET", "/remove/3/1")
                    .header(header::COOKIE, "cart=%7B%229%22%3A1%7D")
                    .header("x-cart-localstorage", r#"{"3":1}"#)
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(set_cookie(&response).starts_with("cart=%7B%223%22%3A1%2C%229%22%3A1%7D"));
    }

    #[tokio::test]
    async fn test_remove_rejects_non_positive_quantity() {
        let response = app()
            .oneshot(request("GET", "/remove/3/0").body(empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity_before_lookup() {
        let response = app()
            .oneshot(
                request("POST", "/add/3")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(axum::body::Body::from("quantity=lots"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
