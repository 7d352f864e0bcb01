//! Integration tests for browsing, the guest cart and account carts.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront running with `ADMIN_API_TOKEN` set
//!
//! Run with: cargo test -p fnuc-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use fnuc_integration_tests::{TestContext, browser, item_id, unique_email};

async fn context() -> TestContext {
    TestContext::new()
        .await
        .expect("Failed to set up test context")
}

async fn cart_count(ctx: &TestContext, client: &Client) -> i64 {
    let body: Value = client
        .get(ctx.url("/cart/count"))
        .send()
        .await
        .expect("Failed to get cart count")
        .json()
        .await
        .expect("Failed to parse cart count");
    body["count"].as_i64().expect("count is not a number")
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_health_endpoints() {
    let ctx = context().await;

    let resp = ctx
        .client
        .get(ctx.url("/health"))
        .send()
        .await
        .expect("Failed to call health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .expect("Failed to call readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Guest Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_guest_cart_lives_in_cookie() {
    let ctx = context().await;
    let created = ctx
        .create_item("Guest Cart Earbuds", 5)
        .await
        .expect("Failed to create item");
    let id = item_id(&created).expect("Created item has no id");
    let guest = browser().expect("Failed to build client");

    assert_eq!(cart_count(&ctx, &guest).await, 0);

    let resp = guest
        .post(ctx.url(&format!("/add/{id}")))
        .form(&[("quantity", "3")])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/?success=added");
    assert_eq!(cart_count(&ctx, &guest).await, 3);

    let resp = guest
        .get(ctx.url(&format!("/remove/{id}/2")))
        .send()
        .await
        .expect("Failed to remove from cart");
    assert_eq!(resp.headers()["location"], "/cart");
    assert_eq!(cart_count(&ctx, &guest).await, 1);

    let resp = guest
        .get(ctx.url("/cart"))
        .send()
        .await
        .expect("Failed to get cart page");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.text()
            .await
            .expect("Failed to read cart page")
            .contains("Guest Cart Earbuds")
    );

    ctx.purge_item(id).await.expect("Failed to clean up");
}

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_local_storage_sync_merges_into_cookie() {
    let ctx = context().await;
    let guest = browser().expect("Failed to build client");

    let resp = guest
        .post(ctx.url("/api/sync-cart"))
        .json(&json!({"41": 2, "nonsense": 1}))
        .send()
        .await
        .expect("Failed to sync cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse sync response");
    assert_eq!(body, json!({"success": true, "cart": {"41": 2}}));

    let resp = guest
        .post(ctx.url("/api/sync-cart"))
        .json(&json!({"41": 1}))
        .send()
        .await
        .expect("Failed to sync cart again");
    let body: Value = resp.json().await.expect("Failed to parse sync response");
    assert_eq!(body["cart"], json!({"41": 3}));
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_login_moves_guest_cart_to_account() {
    let ctx = context().await;
    let created = ctx
        .create_item("Migrating Speaker", 9)
        .await
        .expect("Failed to create item");
    let id = item_id(&created).expect("Created item has no id");
    let email = unique_email("cart-migration");
    let client = browser().expect("Failed to build client");

    client
        .post(ctx.url(&format!("/add/{id}")))
        .form(&[("quantity", "2")])
        .send()
        .await
        .expect("Failed to add to cart");

    // Registration does not log in; the guest cart survives until login
    let resp = ctx
        .register_and_login(&client, &email)
        .await
        .expect("Failed to register and log in");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/?success=cart_synced");

    let stored: i32 = sqlx::query_scalar(
        r"
        SELECT c.quantity
        FROM storefront.cart c
        JOIN storefront.users u ON u.id = c.user_id
        WHERE u.email = $1 AND c.item_id = $2
        ",
    )
    .bind(&email)
    .bind(id.as_i32())
    .fetch_one(&ctx.pool)
    .await
    .expect("Cart row was not created");
    assert_eq!(stored, 2);
    assert_eq!(cart_count(&ctx, &client).await, 2);

    // Logged-in users cannot use the local-storage sync
    let resp = client
        .post(ctx.url("/api/sync-cart"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to call sync");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(ctx.url("/orders"))
        .send()
        .await
        .expect("Failed to get orders page");
    assert_eq!(resp.status(), StatusCode::OK);

    ctx.purge_user(&email).await.expect("Failed to clean up user");
    ctx.purge_item(id).await.expect("Failed to clean up item");
}

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_wrong_password_is_rejected() {
    let ctx = context().await;
    let client = browser().expect("Failed to build client");

    let resp = client
        .post(ctx.url("/login"))
        .form(&[("email", "nobody@example.com"), ("password", "not-the-password")])
        .send()
        .await
        .expect("Failed to post login");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/login?error=credentials");
}

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_orders_require_login() {
    let ctx = context().await;
    let client = browser().expect("Failed to build client");

    let resp = client
        .get(ctx.url("/orders"))
        .send()
        .await
        .expect("Failed to get orders page");
    assert!(resp.status().is_redirection());
}
