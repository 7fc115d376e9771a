use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use oliminate_catalog::{Item, ItemKind, ItemUpdate, ListingFilter, MerchandiseCategory, NewItem, SortOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::CurrentBuyer, error::AppError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub kind: Option<String>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
}

impl ItemQuery {
    /// Empty parameters mean "no filter", as sent by the browse form.
    fn into_filter(self) -> Result<ListingFilter, AppError> {
        let kind = non_empty(self.kind)
            .map(|k| k.parse::<ItemKind>())
            .transpose()?;
        let category = non_empty(self.category)
            .map(|c| c.parse::<MerchandiseCategory>())
            .transpose()?;

        Ok(ListingFilter {
            kind,
            category,
            sort: SortOrder::from_query(self.sort_by.as_deref()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct CategoryChoice {
    pub code: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ItemListing {
    pub items: Vec<Item>,
    pub category_choices: Vec<CategoryChoice>,
    pub current_category: Option<MerchandiseCategory>,
    pub current_sort: SortOrder,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/items", get(list_items).post(create_item))
        .route(
            "/v1/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
}

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<ItemListing>, AppError> {
    let filter = query.into_filter()?;
    let items = state.catalog.list_items(&filter).await?;

    Ok(Json(ItemListing {
        items,
        category_choices: MerchandiseCategory::ALL
            .iter()
            .map(|c| CategoryChoice { code: c.as_str(), label: c.label() })
            .collect(),
        current_category: filter.category,
        current_sort: filter.sort,
    }))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.catalog.get_item(id).await?))
}

async fn create_item(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(req): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let item = state.catalog.create_item(&buyer, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
    Json(req): Json<ItemUpdate>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.catalog.update_item(&buyer, id, req).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_item(&buyer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
