//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                - Liveness check
//! GET    /health/ready          - Readiness check (store reachable)
//!
//! # Accounts
//! POST   /users/signup          - Create account, returns tokens
//! POST   /users/login           - Login, returns tokens
//! POST   /users/refresh         - Exchange a refresh token for new tokens
//!
//! # Catalog
//! GET    /users/productview     - All products
//! GET    /users/search?name=    - Case-insensitive substring search
//! POST   /admin/addproduct      - Add a product (requires auth)
//!
//! # Cart (requires auth)
//! GET    /addtocart?id=         - Append one line for the product
//! GET    /removeitem?id=        - Remove every line for the product
//! GET    /listcart              - Cart lines and total
//! GET    /cartcheckout          - Turn the cart into orders
//! GET    /instantbuy?id=        - Buy one product, cart untouched
//!
//! # Addresses (requires auth)
//! POST   /addaddress            - Fill the first free slot
//! PUT    /edithomeaddress       - Replace the home address
//! PUT    /editworkaddress       - Replace the work address
//! DELETE /deleteaddresses       - Clear both slots
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod products;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware,
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::db::Store;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// All API routes, without state or layers.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .merge(auth::router())
        .merge(products::router())
        .merge(cart::router())
        .merge(addresses::router())
}

/// The full application: routes, request tracing and request IDs.
///
/// Sentry layers are added by the binary so tests stay free of them.
pub fn app<S: Store>(state: AppState<S>) -> Router {
    routes()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use chrono::TimeDelta;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use basket_core::{Price, Product, ProductId};

    use super::*;
    use crate::config::ServerConfig;
    use crate::db::{MemoryStore, ProductStore};
    use crate::middleware::request_id::REQUEST_ID_HEADER;
    use crate::services::cart::CartSettings;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://unused".to_owned()),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            jwt_secret: SecretString::from("kq8V3nZ1xR7bT2mW9cY4pL6dF0hJ5sGa".to_owned()),
            access_token_ttl: TimeDelta::hours(1),
            refresh_token_ttl: TimeDelta::hours(24),
            cart: CartSettings::default(),
            idempotency_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    struct TestApp {
        router: Router,
        store: MemoryStore,
    }

    impl TestApp {
        fn new() -> Self {
            let store = MemoryStore::new();
            let state = AppState::new(store.clone(), &test_config());
            Self {
                router: app(state),
                store,
            }
        }

        async fn product(&self, name: &str, cents: i64) -> ProductId {
            let product = Product {
                id: ProductId::generate(),
                name: name.to_owned(),
                price: Price::from_cents(cents).unwrap(),
                rating: None,
                image: None,
            };
            self.store.create_product(&product).await.unwrap();
            product.id
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.send_with(method, uri, token, body, &[]).await
        }

        async fn send_with(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
            headers: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("token", token);
            }
            for (name, value) in headers {
                builder = builder.header(*name, *value);
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn signup(&self, email: &str, phone: &str) -> String {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/users/signup",
                    None,
                    Some(json!({
                        "email": email,
                        "password": "correct-horse-battery",
                        "first_name": "Ada",
                        "last_name": "Lovelace",
                        "phone": phone,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["token"].as_str().unwrap().to_owned()
        }
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");

        let (status, _) = app.send(Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let app = TestApp::new();
        app.signup("ada@example.com", "555-0100").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/users/login",
                None,
                Some(json!({ "email": "ADA@example.com", "password": "correct-horse-battery" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
        assert!(body["refresh_token"].is_string());

        let (status, _) = app
            .send(
                Method::POST,
                "/users/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_exchanges_refresh_token_only() {
        let app = TestApp::new();
        let access = app.signup("ada@example.com", "555-0100").await;
        let (_, session) = app
            .send(
                Method::POST,
                "/users/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "correct-horse-battery" })),
            )
            .await;
        let refresh = session["refresh_token"].as_str().unwrap();

        let (status, body) = app
            .send(
                Method::POST,
                "/users/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let renewed = body["token"].as_str().unwrap();
        let (status, _) = app.send(Method::GET, "/listcart", Some(renewed), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(
                Method::POST,
                "/users/refresh",
                None,
                Some(json!({ "refresh_token": access })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.send(Method::GET, "/listcart", Some(refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let app = TestApp::new();
        app.signup("ada@example.com", "555-0100").await;

        let (status, _) = app
            .send(
                Method::POST,
                "/users/signup",
                None,
                Some(json!({
                    "email": "ada@example.com",
                    "password": "correct-horse-battery",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "phone": "555-0199",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cart_routes_require_token() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/listcart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No Authorization Header Provided");

        let (status, _) = app
            .send(Method::GET, "/listcart", Some("not-a-token"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_add_list_checkout_flow() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let phone = app.product("Phone", 49_900).await;
        let case = app.product("Case", 1_500).await;

        for id in [phone, case, phone] {
            let (status, body) = app
                .send(Method::GET, &format!("/addtocart?id={id}"), Some(&token), None)
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["message"], "Successfully added to the cart");
        }

        let (status, body) = app.send(Method::GET, "/listcart", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);
        assert_eq!(body["total"], "1013.00");

        let (status, body) = app
            .send(Method::GET, &format!("/removeitem?id={phone}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["removed"], 2);

        let (status, body) = app
            .send(Method::GET, "/cartcheckout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let orders = body["result"]["orders"].as_array().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["product_id"], case.to_string());

        let (status, body) = app
            .send(Method::GET, "/cartcheckout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["result"]["orders"].as_array().unwrap().is_empty());

        let (status, _) = app
            .send(Method::GET, &format!("/removeitem?id={case}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_with_deleted_product_is_not_found() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let phone = app.product("Phone", 49_900).await;

        let (status, _) = app
            .send(Method::GET, &format!("/addtocart?id={phone}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        app.store.remove_product(phone).await.unwrap();

        let (status, _) = app
            .send(Method::GET, "/cartcheckout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = app.send(Method::GET, "/listcart", Some(&token), None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_instant_buy_leaves_cart_alone() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let phone = app.product("Phone", 49_900).await;

        let (status, body) = app
            .send(Method::GET, &format!("/instantbuy?id={phone}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["product_id"], phone.to_string());

        let (_, body) = app.send(Method::GET, "/listcart", Some(&token), None).await;
        assert!(body["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_and_unknown_product_ids() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;

        let (status, _) = app
            .send(Method::GET, "/addtocart?id=not-a-uuid", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.send(Method::GET, "/addtocart", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "product id is empty");

        let unknown = ProductId::generate();
        let (status, _) = app
            .send(Method::GET, &format!("/addtocart?id={unknown}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_idempotency_key_replays_add() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let phone = app.product("Phone", 49_900).await;
        let uri = format!("/addtocart?id={phone}");

        for _ in 0..2 {
            let (status, _) = app
                .send_with(
                    Method::GET,
                    &uri,
                    Some(&token),
                    None,
                    &[("idempotency-key", "add-once")],
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = app.send(Method::GET, "/listcart", Some(&token), None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idempotency_key_reused_for_other_product_runs() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let phone = app.product("Phone", 49_900).await;
        let case = app.product("Case", 1_500).await;

        for id in [phone, case] {
            let (status, body) = app
                .send_with(
                    Method::GET,
                    &format!("/addtocart?id={id}"),
                    Some(&token),
                    None,
                    &[("idempotency-key", "same-key")],
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["result"]["product_id"], id.to_string());
        }

        let (_, body) = app.send(Method::GET, "/listcart", Some(&token), None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_product_admin_and_search() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let body = json!({ "name": "Gaming Phone", "price": "499.00" });

        let (status, _) = app
            .send(Method::POST, "/admin/addproduct", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, created) = app
            .send(Method::POST, "/admin/addproduct", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Gaming Phone");

        let (status, _) = app
            .send(
                Method::POST,
                "/admin/addproduct",
                Some(&token),
                Some(json!({ "name": "Sub-cent Case", "price": "19.999" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, found) = app
            .send(Method::GET, "/users/search?name=phone", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send(Method::GET, "/users/search?name=", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, all) = app
            .send(Method::GET, "/users/productview", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_address_slots() {
        let app = TestApp::new();
        let token = app.signup("ada@example.com", "555-0100").await;
        let address = json!({
            "house": "12",
            "street": "Analytical Way",
            "city": "London",
            "pincode": "NW1",
        });

        let (status, _) = app
            .send(Method::PUT, "/editworkaddress", Some(&token), Some(address.clone()))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .send(Method::POST, "/addaddress", Some(&token), Some(address.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slot"], "home");

        let (_, body) = app
            .send(Method::POST, "/addaddress", Some(&token), Some(address.clone()))
            .await;
        assert_eq!(body["slot"], "work");

        let (status, _) = app
            .send(Method::POST, "/addaddress", Some(&token), Some(address.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(Method::PUT, "/editworkaddress", Some(&token), Some(address.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(Method::DELETE, "/deleteaddresses", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send(Method::POST, "/addaddress", Some(&token), Some(address))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slot"], "home");
    }
}
