//! Integration tests for cart migration arithmetic, catalogue visibility and
//! order fulfillment.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront running with `ADMIN_API_TOKEN` set
//!
//! Run with: cargo test -p fnuc-integration-tests -- --ignored

use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use fnuc_core::{ItemId, UserId};
use fnuc_integration_tests::{TEST_PASSWORD, TestContext, browser, item_id, unique_email};
use fnuc_storefront::services::{Fulfillment, FulfillmentService};

async fn context() -> TestContext {
    TestContext::new()
        .await
        .expect("Failed to set up test context")
}

async fn user_id(ctx: &TestContext, email: &str) -> UserId {
    let id: i32 = sqlx::query_scalar("SELECT id FROM storefront.users WHERE email = $1")
        .bind(email)
        .fetch_one(&ctx.pool)
        .await
        .expect("User was not created");
    UserId::new(id)
}

async fn cart_quantity(ctx: &TestContext, user: UserId, item: ItemId) -> Option<i32> {
    sqlx::query_scalar("SELECT quantity FROM storefront.cart WHERE user_id = $1 AND item_id = $2")
        .bind(user)
        .bind(item)
        .fetch_optional(&ctx.pool)
        .await
        .expect("Failed to read cart")
}

async fn put_in_cart(ctx: &TestContext, user: UserId, item: ItemId, quantity: i32) {
    sqlx::query("INSERT INTO storefront.cart (user_id, item_id, quantity) VALUES ($1, $2, $3)")
        .bind(user)
        .bind(item)
        .bind(quantity)
        .execute(&ctx.pool)
        .await
        .expect("Failed to seed cart row");
}

// ============================================================================
// Cart Migration
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_migration_adds_to_existing_rows() {
    let ctx = context().await;
    let first = item_id(&ctx.create_item("Migration Phone", 20).await.expect("create"))
        .expect("Created item has no id");
    let second = item_id(&ctx.create_item("Migration Charger", 20).await.expect("create"))
        .expect("Created item has no id");
    let email = unique_email("migration-sum");
    let client = browser().expect("Failed to build client");

    client
        .post(ctx.url("/register"))
        .form(&[
            ("name", "Sum Tester"),
            ("email", email.as_str()),
            ("password", TEST_PASSWORD),
            ("phone", "0700000000"),
        ])
        .send()
        .await
        .expect("Failed to register");
    let user = user_id(&ctx, &email).await;
    put_in_cart(&ctx, user, first, 4).await;

    // Guest cart {first: 2, second: 1}
    for (id, quantity) in [(first, "2"), (second, "1")] {
        client
            .post(ctx.url(&format!("/add/{id}")))
            .form(&[("quantity", quantity)])
            .send()
            .await
            .expect("Failed to add to cart");
    }

    let resp = client
        .post(ctx.url("/login"))
        .form(&[("email", email.as_str()), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.headers()["location"], "/?success=cart_synced");

    assert_eq!(cart_quantity(&ctx, user, first).await, Some(6));
    assert_eq!(cart_quantity(&ctx, user, second).await, Some(1));

    ctx.purge_user(&email).await.expect("Failed to clean up user");
    ctx.purge_item(first).await.expect("Failed to clean up item");
    ctx.purge_item(second).await.expect("Failed to clean up item");
}

// ============================================================================
// Catalogue
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_unpublished_items_are_hidden() {
    let ctx = context().await;
    let name = format!("Hidden Prototype {}", Uuid::new_v4().simple());
    let created = ctx.create_item(&name, 1).await.expect("Failed to create item");
    let id = item_id(&created).expect("Created item has no id");

    let resp = ctx
        .admin(Method::PATCH, &format!("/admin/api/items/{id}"))
        .json(&json!({"is_published": false}))
        .send()
        .await
        .expect("Failed to unpublish");
    assert_eq!(resp.status(), StatusCode::OK);

    let home = ctx
        .client
        .get(ctx.url("/"))
        .send()
        .await
        .expect("Failed to get home page")
        .text()
        .await
        .expect("Failed to read home page");
    assert!(!home.contains(&name));

    let resp = ctx
        .client
        .get(ctx.url(&format!("/item/{id}")))
        .send()
        .await
        .expect("Failed to get item page");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx
        .client
        .get(ctx.url("/search"))
        .query(&[("query", name.as_str())])
        .send()
        .await
        .expect("Failed to search");
    assert!(!resp.text().await.expect("Failed to read search").contains(&name));

    ctx.purge_item(id).await.expect("Failed to clean up");
}

// ============================================================================
// Fulfillment
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and PostgreSQL database"]
async fn test_fulfillment_is_idempotent_per_session() {
    let ctx = context().await;
    let item = item_id(&ctx.create_item("Fulfilled Tablet", 10).await.expect("create"))
        .expect("Created item has no id");
    let email = unique_email("fulfillment");
    let client = browser().expect("Failed to build client");
    ctx.register_and_login(&client, &email)
        .await
        .expect("Failed to register");
    let user = user_id(&ctx, &email).await;
    put_in_cart(&ctx, user, item, 3).await;

    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    let service = FulfillmentService::new(&ctx.pool);

    let first = service
        .fulfill(user, &session_id, Utc::now())
        .await
        .expect("Fulfillment failed");
    let Fulfillment::Fulfilled(order_id) = first else {
        panic!("Expected a new order, got {first:?}");
    };

    let second = service
        .fulfill(user, &session_id, Utc::now())
        .await
        .expect("Second fulfillment failed");
    assert_eq!(second, Fulfillment::AlreadyFulfilled);

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.orders WHERE user_id = $1")
        .bind(user)
        .fetch_one(&ctx.pool)
        .await
        .expect("Failed to count orders");
    assert_eq!(orders, 1);

    let (status, quantity): (String, i32) = sqlx::query_as(
        r"
        SELECT o.status, oi.quantity
        FROM storefront.orders o
        JOIN storefront.ordered_items oi ON oi.order_id = o.id
        WHERE o.id = $1
        ",
    )
    .bind(order_id)
    .fetch_one(&ctx.pool)
    .await
    .expect("Order has no line item");
    assert_eq!(status, "processing");
    assert_eq!(quantity, 3);

    assert_eq!(cart_quantity(&ctx, user, item).await, None);

    let resp = client
        .get(ctx.url("/orders"))
        .send()
        .await
        .expect("Failed to get orders page");
    assert!(
        resp.text()
            .await
            .expect("Failed to read orders page")
            .contains("Fulfilled Tablet")
    );

    ctx.purge_user(&email).await.expect("Failed to clean up user");
    ctx.purge_item(item).await.expect("Failed to clean up item");
}
