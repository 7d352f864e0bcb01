//! Cart JSON endpoints used by the browser's local-storage mirror.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use fnuc_core::GuestCart;

use crate::error::{ApiError, ApiResult};
use crate::middleware::OptionalAuth;
use crate::middleware::guest_cart::{GuestCartInput, cart_cookie, with_cookie};
use crate::state::AppState;

/// Response of `POST /api/sync-cart`.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub cart: GuestCart,
}

/// Response of `GET /api/get-cart`.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: GuestCart,
}

/// Merge the posted local-storage cart into the cookie.
///
/// Guests only; logged-in users keep their cart in the database. A missing
/// or malformed body counts as an empty cart.
#[instrument(skip_all)]
pub async fn sync_cart(
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    body: Bytes,
) -> ApiResult<Response> {
    if user.is_some() {
        return Err(ApiError::bad_request("User is authenticated, use DB"));
    }

    let posted = std::str::from_utf8(&body)
        .map(GuestCart::parse_lenient)
        .unwrap_or_default();
    let merged = guest.cookie.merge(&posted);
    let cookie = cart_cookie(&merged);

    Ok(with_cookie(
        Json(SyncResponse {
            success: true,
            cart: merged,
        }),
        cookie,
    ))
}

/// The current cart mapping: database rows for users, the combined
/// cookie/local-storage cart for guests.
#[instrument(skip_all)]
pub async fn get_cart(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
) -> ApiResult<impl IntoResponse> {
    let cart = super::cart_mapping(&state, user.as_ref(), &guest).await?;
    Ok(Json(CartResponse { cart }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{StatusCode, header};
    use tower::ServiceExt;

    use crate::routes::tests::{body_json, empty, request};
    use crate::services::LogMailer;
    use crate::state::tests::test_state;

    fn app() -> axum::Router {
        let state = test_state(Arc::new(LogMailer));
        crate::routes::routes(&state).with_state(state)
    }

    #[tokio::test]
    async fn test_sync_merges_cookie_and_posted_cart() {
        let response = app()
            .oneshot(
                request("POST", "/api/sync-cart")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, "cart=%7B%223%22%3A2%7D")
                    .body(axum::body::Body::from(r#"{"3":1,"5":"2","bad":4}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_owned();
        assert!(cookie.starts_with("cart=%7B%223%22%3A3%2C%225%22%3A2%7D"));
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": true, "cart": {"3": 3, "5": 2}})
        );
    }

    #[tokio::test]
    async fn test_sync_with_empty_body_keeps_cookie() {
        let response = app()
            .oneshot(
                request("POST", "/api/sync-cart")
                    .header(header::COOKIE, "cart=%7B%224%22%3A1%7D")
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": true, "cart": {"4": 1}})
        );
    }

    #[tokio::test]
    async fn test_get_cart_prefers_cookie() {
        let response = app()
            .oneshot(
                request("GET", "/api/get-cart")
                    .header(header::COOKIE, "cart=%7B%224%22%3A1%7D")
                    .header("x-cart-localstorage", r#"{"9":9}"#)
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"cart": {"4": 1}})
        );
    }

    #[tokio::test]
    async fn test_get_cart_from_local_storage_query() {
        let response = app()
            .oneshot(
                request("GET", "/api/get-cart?cart_localstorage=%7B%222%22%3A3%7D")
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"cart": {"2": 3}})
        );
    }
}
