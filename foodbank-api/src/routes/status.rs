//! Batch status updates
//!
//! `POST /v1/parcels/status` appends one event per selected parcel in a
//! single insert. Unknown parcel ids are rejected before anything is written.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use foodbank_shared::{
    error::DbResultExt,
    forms::StatusUpdateForm,
    models::{event::ParcelEvent, parcel::Parcel},
};
use std::collections::HashSet;
use uuid::Uuid;

/// `POST /v1/parcels/status`
pub async fn update_status(
    State(state): State<AppState>,
    Json(form): Json<StatusUpdateForm>,
) -> ApiResult<(StatusCode, Json<Vec<ParcelEvent>>)> {
    let status = form.check()?;

    let mut seen = HashSet::new();
    let parcel_ids: Vec<Uuid> = form
        .parcel_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();

    let found: HashSet<Uuid> = Parcel::find_by_ids(&state.db, &parcel_ids)
        .await
        .db_context("fetch parcels")?
        .into_iter()
        .map(|parcel| parcel.primary_key)
        .collect();

    let missing: Vec<String> = parcel_ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(Uuid::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Parcels not found: {}",
            missing.join(", ")
        )));
    }

    let events = ParcelEvent::record(&state.db, &parcel_ids, status, form.event_data.trim())
        .await
        .db_context("record parcel status")?;

    Ok((StatusCode::CREATED, Json(events)))
}
