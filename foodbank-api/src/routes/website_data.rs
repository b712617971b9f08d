//! Website data endpoints
//!
//! Free text entries such as the shopping list footer and the driver
//! overview message, addressed by name.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use foodbank_shared::{error::DbResultExt, models::website_data::WebsiteData};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateWebsiteDataRequest {
    pub value: String,
}

/// `GET /v1/website-data`
pub async fn list_website_data(State(state): State<AppState>) -> ApiResult<Json<Vec<WebsiteData>>> {
    let entries = WebsiteData::list(&state.db)
        .await
        .db_context("fetch website data")?;
    Ok(Json(entries))
}

/// `GET /v1/website-data/:name`
pub async fn get_website_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<WebsiteData>> {
    let value = WebsiteData::get(&state.db, &name)
        .await
        .db_context("fetch website data")?
        .ok_or_else(|| ApiError::NotFound(format!("No website data named '{}'", name)))?;

    Ok(Json(WebsiteData { name, value }))
}

/// `PUT /v1/website-data/:name`
pub async fn update_website_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateWebsiteDataRequest>,
) -> ApiResult<Json<WebsiteData>> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let entry = WebsiteData::upsert(&state.db, &name, &req.value)
        .await
        .db_context("update website data")?;

    Ok(Json(entry))
}
