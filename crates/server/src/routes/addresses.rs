//! Address book routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, post, put},
};
use serde_json::{Value, json};
use tracing::instrument;

use basket_core::{Address, AddressSlot};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/addaddress", post(add_address::<S>))
        .route("/edithomeaddress", put(edit_home::<S>))
        .route("/editworkaddress", put(edit_work::<S>))
        .route("/deleteaddresses", delete(delete_addresses::<S>))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn add_address<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Json(address): Json<Address>,
) -> Result<(StatusCode, Json<Value>)> {
    let slot = state.addresses().add(user.id, &address).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Successfully added the address", "slot": slot })),
    ))
}

async fn edit_slot<S: Store>(
    state: &AppState<S>,
    user_id: basket_core::UserId,
    slot: AddressSlot,
    address: &Address,
) -> Result<Json<Value>> {
    state.addresses().edit(user_id, slot, address).await?;
    Ok(Json(json!({
        "message": format!("Successfully updated the {slot} address"),
        "slot": slot,
    })))
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn edit_home<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Json(address): Json<Address>,
) -> Result<Json<Value>> {
    edit_slot(&state, user.id, AddressSlot::Home, &address).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn edit_work<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Json(address): Json<Address>,
) -> Result<Json<Value>> {
    edit_slot(&state, user.id, AddressSlot::Work, &address).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
async fn delete_addresses<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    state.addresses().delete_all(user.id).await?;
    Ok(Json(json!({ "message": "Successfully deleted" })))
}
