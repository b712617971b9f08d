//! Document endpoints
//!
//! Each endpoint returns the view model of one printable document and
//! appends the matching "... Downloaded" status event to every parcel the
//! document covers.
//!
//! - `POST /v1/pdfs/shopping-lists`
//! - `POST /v1/pdfs/shipping-labels`
//! - `POST /v1/pdfs/driver-overview`
//! - `POST /v1/pdfs/day-overview`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use chrono::NaiveDate;
use foodbank_shared::{
    error::DbResultExt,
    models::{
        collection_centre::CollectionCentre,
        event::{ParcelEvent, ParcelStatus},
        list_item::ListItem,
        website_data::{WebsiteData, DRIVER_OVERVIEW_MESSAGE, SHOPPING_LIST_FOOTER},
    },
    pdf::{
        build_day_overview, build_driver_overview, build_shipping_labels, build_shopping_list,
        load_day_parcels, load_parcel_documents, DayOverview, DriverOverview, ParcelDocumentData,
        ShippingLabel, ShoppingList,
    },
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ShoppingListsRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 parcels"))]
    pub parcel_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingLabelsRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 parcels"))]
    pub parcel_ids: Vec<Uuid>,

    /// Labels per parcel; clamped to the printable range
    #[serde(default = "default_label_count")]
    pub label_count: usize,
}

fn default_label_count() -> usize {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct DriverOverviewRequest {
    #[validate(length(min = 1, max = 100, message = "Driver name is required"))]
    pub driver_name: String,

    pub date: NaiveDate,

    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 parcels"))]
    pub parcel_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DayOverviewRequest {
    pub date: NaiveDate,
    pub collection_centre: Option<Uuid>,
}

async fn record_download(
    pool: &PgPool,
    documents: &[ParcelDocumentData],
    status: ParcelStatus,
    event_data: &str,
) -> ApiResult<()> {
    let mut parcel_ids: Vec<Uuid> = documents.iter().map(|d| d.parcel.primary_key).collect();
    parcel_ids.sort_unstable();
    parcel_ids.dedup();

    ParcelEvent::record(pool, &parcel_ids, status, event_data)
        .await
        .db_context("record document download")?;
    Ok(())
}

/// `POST /v1/pdfs/shopping-lists`
pub async fn shopping_lists(
    State(state): State<AppState>,
    Json(req): Json<ShoppingListsRequest>,
) -> ApiResult<Json<Vec<ShoppingList>>> {
    req.validate()?;

    let documents = load_parcel_documents(&state.db, &req.parcel_ids).await?;
    let items = ListItem::list(&state.db)
        .await
        .db_context("fetch list items")?;
    let footer = WebsiteData::get_or_empty(&state.db, SHOPPING_LIST_FOOTER)
        .await
        .db_context("fetch shopping list footer")?;

    let lists = documents
        .iter()
        .map(|data| build_shopping_list(data, &items, &footer))
        .collect();

    record_download(&state.db, &documents, ParcelStatus::ShoppingListDownloaded, "").await?;
    Ok(Json(lists))
}

/// `POST /v1/pdfs/shipping-labels`
pub async fn shipping_labels(
    State(state): State<AppState>,
    Json(req): Json<ShippingLabelsRequest>,
) -> ApiResult<Json<Vec<ShippingLabel>>> {
    req.validate()?;

    let documents = load_parcel_documents(&state.db, &req.parcel_ids).await?;
    let labels = build_shipping_labels(&documents, req.label_count);

    record_download(&state.db, &documents, ParcelStatus::ShippingLabelsDownloaded, "").await?;
    Ok(Json(labels))
}

/// `POST /v1/pdfs/driver-overview`
///
/// The driver's name is stored as the event data.
pub async fn driver_overview(
    State(state): State<AppState>,
    Json(req): Json<DriverOverviewRequest>,
) -> ApiResult<Json<DriverOverview>> {
    req.validate()?;

    let documents = load_parcel_documents(&state.db, &req.parcel_ids).await?;
    let message = WebsiteData::get_or_empty(&state.db, DRIVER_OVERVIEW_MESSAGE)
        .await
        .db_context("fetch driver overview message")?;

    let overview = build_driver_overview(&req.driver_name, req.date, &message, &documents);

    record_download(
        &state.db,
        &documents,
        ParcelStatus::DriverOverviewDownloaded,
        &overview.driver_name,
    )
    .await?;
    Ok(Json(overview))
}

/// `POST /v1/pdfs/day-overview`
pub async fn day_overview(
    State(state): State<AppState>,
    Json(req): Json<DayOverviewRequest>,
) -> ApiResult<Json<DayOverview>> {
    let centre = match req.collection_centre {
        Some(id) => Some(
            CollectionCentre::find_by_id(&state.db, id)
                .await
                .db_context("fetch collection centre")?
                .ok_or_else(|| ApiError::NotFound("Collection centre not found".to_string()))?,
        ),
        None => None,
    };

    let documents = load_day_parcels(&state.db, req.date, req.collection_centre).await?;
    let overview = build_day_overview(req.date, centre.as_ref(), &documents);

    record_download(&state.db, &documents, ParcelStatus::DayOverviewDownloaded, "").await?;
    Ok(Json(overview))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_count_defaults_to_one() {
        let req: ShippingLabelsRequest = serde_json::from_value(serde_json::json!({
            "parcel_ids": [Uuid::new_v4()]
        }))
        .unwrap();
        assert_eq!(req.label_count, 1);
    }

    #[test]
    fn test_empty_selection_rejected() {
        let req = ShoppingListsRequest { parcel_ids: vec![] };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_driver_name_required() {
        let req = DriverOverviewRequest {
            driver_name: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            parcel_ids: vec![Uuid::new_v4()],
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("driver_name"));
    }
}
