use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use oliminate_order::{Ticket, TicketPurchase};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::CurrentBuyer, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub slot_id: Uuid,
    pub quantity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tickets", post(purchase_tickets).get(list_tickets))
        .route("/v1/tickets/{id}/scan", post(scan_ticket))
}

async fn purchase_tickets(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<TicketPurchase>), AppError> {
    let purchase = state
        .tickets
        .purchase_tickets(&buyer, req.slot_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

async fn list_tickets(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<Json<Vec<Ticket>>, AppError> {
    Ok(Json(state.tickets.list_tickets(&buyer).await?))
}

async fn scan_ticket(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.tickets.scan_ticket(&buyer, id).await?))
}
