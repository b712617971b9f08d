//! Collection calendar
//!
//! `GET /v1/calendar?start=..&end=..` lists one entry per parcel whose
//! collection datetime falls in `[start, end)`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use foodbank_shared::{error::DbResultExt, models::parcel::ParcelWithClient};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a collection slot on the calendar
pub const COLLECTION_SLOT_MINUTES: i64 = 30;

/// Widest window one request may cover
pub const MAX_CALENDAR_DAYS: i64 = 366;

#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub parcel_id: Uuid,
    pub client_id: Uuid,

    /// "Full Name (ACR)"
    pub title: String,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub collection_centre: Option<String>,
}

impl CalendarEntry {
    /// `None` for parcels without a collection datetime
    fn from_parcel(parcel: ParcelWithClient) -> Option<Self> {
        let start = parcel.collection_datetime?;

        let title = match parcel.collection_centre_acronym.as_deref() {
            Some(acronym) if !acronym.is_empty() => format!("{} ({})", parcel.full_name, acronym),
            _ => parcel.full_name.clone(),
        };

        Some(Self {
            parcel_id: parcel.parcel_id,
            client_id: parcel.client_id,
            title,
            start,
            end: start + Duration::minutes(COLLECTION_SLOT_MINUTES),
            collection_centre: parcel.collection_centre_name,
        })
    }
}

/// `GET /v1/calendar`
pub async fn calendar(
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> ApiResult<Json<Vec<CalendarEntry>>> {
    if params.end <= params.start {
        return Err(ApiError::BadRequest("Calendar end must be after start".to_string()));
    }
    if params.end - params.start > Duration::days(MAX_CALENDAR_DAYS) {
        return Err(ApiError::BadRequest(format!(
            "Calendar window cannot exceed {} days",
            MAX_CALENDAR_DAYS
        )));
    }

    let parcels = ParcelWithClient::collections_between(&state.db, params.start, params.end)
        .await
        .db_context("fetch collections")?;

    Ok(Json(
        parcels.into_iter().filter_map(CalendarEntry::from_parcel).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parcel(acronym: Option<&str>, at: Option<DateTime<Utc>>) -> ParcelWithClient {
        ParcelWithClient {
            parcel_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            packing_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            packing_slot: None,
            voucher_number: None,
            collection_datetime: at,
            collection_centre_name: acronym.map(|_| "Community Hall".to_string()),
            collection_centre_acronym: acronym.map(String::from),
        }
    }

    #[test]
    fn test_entry_title_and_slot() {
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let entry = CalendarEntry::from_parcel(parcel(Some("CH"), Some(at))).unwrap();

        assert_eq!(entry.title, "Ada Lovelace (CH)");
        assert_eq!(entry.start, at);
        assert_eq!(entry.end, Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap());
        assert_eq!(entry.collection_centre.as_deref(), Some("Community Hall"));
    }

    #[test]
    fn test_entry_without_centre() {
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let entry = CalendarEntry::from_parcel(parcel(None, Some(at))).unwrap();
        assert_eq!(entry.title, "Ada Lovelace");
    }

    #[test]
    fn test_no_collection_datetime() {
        assert!(CalendarEntry::from_parcel(parcel(Some("CH"), None)).is_none());
    }
}
