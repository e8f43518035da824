//! Cart and order routes.
//!
//! Every route acts on the authenticated user. Mutations accept an optional
//! `Idempotency-Key` header; a repeated key for the same product replays the
//! first result.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::cart::CartView;
use crate::services::idempotency::CartReceipt;
use crate::state::AppState;

/// Header carrying a client-chosen idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// `?id=<product id>` query.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub id: Option<String>,
}

impl ProductQuery {
    fn product_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("product id is empty".to_string()))
    }
}

/// Response body of a cart mutation.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub message: &'static str,
    pub result: CartReceipt,
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/addtocart", get(add_to_cart::<S>))
        .route("/removeitem", get(remove_item::<S>))
        .route("/listcart", get(list_cart::<S>))
        .route("/cartcheckout", get(checkout::<S>))
        .route("/instantbuy", get(instant_buy::<S>))
}

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn add_to_cart<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProductQuery>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>> {
    let product_id = query.product_id()?;
    let uid = user.id.to_string();

    let result = state
        .idempotency()
        .run(
            user.id,
            "addtocart",
            Some(product_id),
            idempotency_key(&headers),
            async {
                state
                    .cart()
                    .add_to_cart(product_id, &uid)
                    .await
                    .map(CartReceipt::Added)
            },
        )
        .await?;

    Ok(Json(CartResponse {
        message: "Successfully added to the cart",
        result,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn remove_item<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProductQuery>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>> {
    let product_id = query.product_id()?;
    let uid = user.id.to_string();

    let result = state
        .idempotency()
        .run(
            user.id,
            "removeitem",
            Some(product_id),
            idempotency_key(&headers),
            async {
                state
                    .cart()
                    .remove_cart_item(product_id, &uid)
                    .await
                    .map(|removed| CartReceipt::Removed { removed })
            },
        )
        .await?;

    Ok(Json(CartResponse {
        message: "Successfully removed item from cart",
        result,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn list_cart<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    Ok(Json(state.cart().list_cart(&user.id.to_string()).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn checkout<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
) -> Result<Json<CartResponse>> {
    let uid = user.id.to_string();

    let result = state
        .idempotency()
        .run(
            user.id,
            "cartcheckout",
            None,
            idempotency_key(&headers),
            async {
                state
                    .cart()
                    .buy_from_cart(&uid)
                    .await
                    .map(|orders| CartReceipt::CheckedOut { orders })
            },
        )
        .await?;

    Ok(Json(CartResponse {
        message: "Successfully placed the order",
        result,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn instant_buy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProductQuery>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>> {
    let product_id = query.product_id()?;
    let uid = user.id.to_string();

    let result = state
        .idempotency()
        .run(
            user.id,
            "instantbuy",
            Some(product_id),
            idempotency_key(&headers),
            async {
                state
                    .cart()
                    .instant_buy(product_id, &uid)
                    .await
                    .map(CartReceipt::Purchased)
            },
        )
        .await?;

    Ok(Json(CartResponse {
        message: "Successfully placed the order",
        result,
    }))
}
