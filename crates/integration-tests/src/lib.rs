//! Integration tests for Basket.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the server
//! cargo run -p basket-cli -- migrate
//! cargo run -p basket-server
//!
//! # Run integration tests
//! cargo test -p basket-integration-tests -- --ignored
//! ```
//!
//! `BASKET_BASE_URL` points the tests at another server
//! (default `http://localhost:8000`).

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("BASKET_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// A freshly registered account and its access token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub client: Client,
    pub email: String,
    pub token: String,
}

impl TestUser {
    /// Sign up a throwaway account with a unique email and phone.
    ///
    /// # Panics
    ///
    /// Panics if the server is unreachable or rejects the signup.
    pub async fn signup() -> Self {
        let client = Client::new();
        let tag = Uuid::new_v4().simple().to_string();
        let email = format!("it-{tag}@example.com");

        let resp = client
            .post(format!("{}/users/signup", base_url()))
            .json(&json!({
                "email": email,
                "password": "integration-pass-123",
                "first_name": "Integration",
                "last_name": "Test",
                "phone": format!("+1-{tag}"),
            }))
            .send()
            .await
            .expect("Failed to sign up");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.expect("Failed to read signup body");
        let token = body["token"]
            .as_str()
            .expect("signup returned no token")
            .to_owned();

        Self {
            client,
            email,
            token,
        }
    }

    /// `GET {base}{path}` with the access token attached.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", base_url()))
            .header("token", &self.token)
    }

    /// `{method} {base}{path}` with the access token attached.
    #[must_use]
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", base_url()))
            .header("token", &self.token)
    }

    /// Create a product through the admin route and return its ID.
    ///
    /// # Panics
    ///
    /// Panics if the product cannot be created.
    pub async fn add_product(&self, name: &str, price: &str) -> String {
        let resp = self
            .request(reqwest::Method::POST, "/admin/addproduct")
            .json(&json!({ "name": name, "price": price }))
            .send()
            .await
            .expect("Failed to add product");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.expect("Failed to read product body");
        body["id"]
            .as_str()
            .expect("product has no id")
            .to_owned()
    }
}
