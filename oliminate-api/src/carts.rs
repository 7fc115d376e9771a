use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use oliminate_core::CoreError;
use oliminate_order::{Cart, CartItem, CartStatus, Receipt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::CurrentBuyer, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub item_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct UpdateQuantityResponse {
    pub removed: bool,
    pub line: Option<CartItem>,
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
    /// Live stock; `None` when the item no longer exists
    pub stock: Option<i32>,
    pub overstock: bool,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub total_price: i64,
    pub any_overstock: bool,
    pub items: Vec<CartLineView>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(current_cart))
        .route("/v1/carts/{id}", get(get_cart))
        .route("/v1/carts/{id}/items", post(add_item))
        .route(
            "/v1/carts/{id}/items/{line_id}",
            patch(update_quantity).delete(remove_line),
        )
        .route("/v1/carts/{id}/checkout", post(checkout))
        .route("/v1/carts/{id}/cancel", post(cancel))
}

async fn cart_view(state: &AppState, cart: Cart) -> Result<CartView, AppError> {
    let mut lines = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let stock = match state.catalog.get_item(line.item_id).await {
            Ok(item) => Some(item.stock),
            Err(CoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        lines.push(CartLineView {
            id: line.id,
            item_id: line.item_id,
            name: line.item_name.clone(),
            unit_price: line.price_snapshot,
            quantity: line.quantity,
            subtotal: line.subtotal()?,
            stock,
            overstock: stock.map_or(true, |s| line.quantity > s),
        });
    }

    Ok(CartView {
        cart_id: cart.id,
        status: cart.status,
        created_at: cart.created_at,
        total_price: cart.total_price()?,
        any_overstock: lines.iter().any(|l| l.overstock),
        items: lines,
    })
}

async fn current_cart(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<Json<CartView>, AppError> {
    let cart = state.carts.open_cart(&buyer).await?;
    Ok(Json(cart_view(&state, cart).await?))
}

async fn get_cart(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    let cart = state.carts.get_cart(&buyer, id).await?;
    Ok(Json(cart_view(&state, cart).await?))
}

async fn add_item(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>), AppError> {
    let line = state
        .carts
        .add_item(&buyer, id, req.item_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

async fn update_quantity(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<UpdateQuantityResponse>, AppError> {
    let line = state
        .carts
        .update_quantity(&buyer, id, line_id, req.quantity)
        .await?;
    Ok(Json(UpdateQuantityResponse {
        removed: line.is_none(),
        line,
    }))
}

async fn remove_line(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.carts.remove_line(&buyer, id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
) -> Result<Json<Receipt>, AppError> {
    Ok(Json(state.carts.checkout(&buyer, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    let cart = state.carts.cancel(&buyer, id).await?;
    Ok(Json(cart_view(&state, cart).await?))
}
