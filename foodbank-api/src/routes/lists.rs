//! Shopping list item endpoints
//!
//! - `GET /v1/lists`: all items in display order
//! - `POST /v1/lists`: add an item
//! - `PUT /v1/lists/:id`: overwrite an item
//! - `DELETE /v1/lists/:id`: remove an item
//! - `POST /v1/lists/swap`: exchange the display positions of two items

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use foodbank_shared::{error::DbResultExt, forms::ListItemForm, models::list_item::ListItem};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub first: Uuid,
    pub second: Uuid,
}

fn item_not_found() -> ApiError {
    ApiError::NotFound("List item not found".to_string())
}

/// `GET /v1/lists`
pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<ListItem>>> {
    let items = ListItem::list(&state.db)
        .await
        .db_context("fetch list items")?;
    Ok(Json(items))
}

/// `POST /v1/lists`
pub async fn create_item(
    State(state): State<AppState>,
    Json(form): Json<ListItemForm>,
) -> ApiResult<(StatusCode, Json<ListItem>)> {
    form.check()?;

    let item = ListItem::create(&state.db, form.into_details())
        .await
        .db_context("create list item")?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// `PUT /v1/lists/:id`
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<ListItemForm>,
) -> ApiResult<Json<ListItem>> {
    form.check()?;

    let item = ListItem::update(&state.db, id, form.into_details())
        .await
        .db_context("update list item")?
        .ok_or_else(item_not_found)?;

    Ok(Json(item))
}

/// `DELETE /v1/lists/:id`
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !ListItem::delete(&state.db, id)
        .await
        .db_context("delete list item")?
    {
        return Err(item_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/lists/swap`
pub async fn swap_items(
    State(state): State<AppState>,
    Json(req): Json<SwapRequest>,
) -> ApiResult<Json<Vec<ListItem>>> {
    if req.first == req.second {
        return Err(ApiError::BadRequest("Cannot swap an item with itself".to_string()));
    }

    if !ListItem::swap_row_order(&state.db, req.first, req.second)
        .await
        .db_context("swap list items")?
    {
        return Err(item_not_found());
    }

    let items = ListItem::list(&state.db)
        .await
        .db_context("fetch list items")?;
    Ok(Json(items))
}
