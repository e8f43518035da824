//! Catalog browsing and product administration.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use basket_core::{Price, Product, ProductId};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Body of `POST /admin/addproduct`.
#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub rating: Option<String>,
    pub image: Option<String>,
}

/// Query of `GET /users/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/users/productview", get(list_products::<S>))
        .route("/users/search", get(search_products::<S>))
        .route("/admin/addproduct", post(add_product::<S>))
}

#[instrument(skip(state))]
async fn list_products<S: Store>(State(state): State<AppState<S>>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store().list_products().await?))
}

#[instrument(skip(state))]
async fn search_products<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("search query is empty".to_string()))?;

    Ok(Json(state.store().search_products(name).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, name = %body.name))]
async fn add_product<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("product name is required".to_string()));
    }
    let price = Price::new(body.price).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let product = Product {
        id: ProductId::generate(),
        name: name.to_owned(),
        price,
        rating: body.rating.filter(|r| !r.trim().is_empty()),
        image: body.image.filter(|i| !i.trim().is_empty()),
    };
    state.store().create_product(&product).await?;

    tracing::info!(product_id = %product.id, "product added");
    Ok((StatusCode::CREATED, Json(product)))
}
