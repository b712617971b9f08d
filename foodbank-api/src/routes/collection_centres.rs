//! Collection centre endpoints
//!
//! The centre list feeds the collection centre checklist of the parcel table.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use foodbank_shared::{
    error::DbResultExt,
    models::collection_centre::{CollectionCentre, CreateCollectionCentre},
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCentreRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 10, message = "Acronym must be 1 to 10 characters"))]
    pub acronym: String,
}

/// `GET /v1/collection-centres`
pub async fn list_centres(State(state): State<AppState>) -> ApiResult<Json<Vec<CollectionCentre>>> {
    let centres = CollectionCentre::list(&state.db)
        .await
        .db_context("fetch collection centres")?;
    Ok(Json(centres))
}

/// `POST /v1/collection-centres`
pub async fn create_centre(
    State(state): State<AppState>,
    Json(req): Json<CreateCentreRequest>,
) -> ApiResult<(StatusCode, Json<CollectionCentre>)> {
    req.validate()?;

    let centre = CollectionCentre::create(
        &state.db,
        CreateCollectionCentre {
            name: req.name.trim().to_string(),
            acronym: req.acronym.trim().to_uppercase(),
        },
    )
    .await
    .db_context("create collection centre")?;

    Ok((StatusCode::CREATED, Json(centre)))
}
