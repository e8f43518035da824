//! End-to-end cart and order flows.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (basket-cli migrate)
//! - The server running (cargo run -p basket-server)
//!
//! Run with: cargo test -p basket-integration-tests -- --ignored

use basket_integration_tests::{TestUser, base_url};
use reqwest::{Client, StatusCode};
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running basket-server and PostgreSQL"]
async fn test_health_endpoints() {
    let client = Client::new();

    let resp = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to reach readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running basket-server and PostgreSQL"]
async fn test_cart_requires_token() {
    let resp = Client::new()
        .get(format!("{}/listcart", base_url()))
        .send()
        .await
        .expect("Failed to call listcart");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running basket-server and PostgreSQL"]
async fn test_add_remove_checkout() {
    let user = TestUser::signup().await;
    let phone = user.add_product("Integration Phone", "499.00").await;
    let case = user.add_product("Integration Case", "15.00").await;

    for id in [&phone, &case, &phone] {
        let resp = user
            .get(&format!("/addtocart?id={id}"))
            .send()
            .await
            .expect("Failed to add to cart");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let cart: Value = user
        .get("/listcart")
        .send()
        .await
        .expect("Failed to list cart")
        .json()
        .await
        .expect("Failed to read cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(cart["total"], "1013.00");

    let removed: Value = user
        .get(&format!("/removeitem?id={phone}"))
        .send()
        .await
        .expect("Failed to remove item")
        .json()
        .await
        .expect("Failed to read removal");
    assert_eq!(removed["result"]["removed"], 2);

    let resp = user
        .get("/cartcheckout")
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to read orders");
    let orders = body["result"]["orders"].as_array().cloned().unwrap_or_default();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders.first().map(|o| o["product_id"].clone()), Some(Value::from(case)));

    let again: Value = user
        .get("/cartcheckout")
        .send()
        .await
        .expect("Failed to check out again")
        .json()
        .await
        .expect("Failed to read second checkout");
    assert_eq!(again["result"]["orders"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore = "Requires running basket-server and PostgreSQL"]
async fn test_instant_buy_and_idempotency() {
    let user = TestUser::signup().await;
    let phone = user.add_product("Integration Instant", "99.00").await;
    let path = format!("/instantbuy?id={phone}");

    let first: Value = user
        .get(&path)
        .header("idempotency-key", "buy-once")
        .send()
        .await
        .expect("Failed to buy")
        .json()
        .await
        .expect("Failed to read order");
    let replay: Value = user
        .get(&path)
        .header("idempotency-key", "buy-once")
        .send()
        .await
        .expect("Failed to replay buy")
        .json()
        .await
        .expect("Failed to read replayed order");
    assert_eq!(first["result"]["order_id"], replay["result"]["order_id"]);

    let fresh: Value = user
        .get(&path)
        .send()
        .await
        .expect("Failed to buy again")
        .json()
        .await
        .expect("Failed to read second order");
    assert_ne!(first["result"]["order_id"], fresh["result"]["order_id"]);
}
