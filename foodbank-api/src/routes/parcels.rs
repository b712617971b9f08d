//! Parcel endpoints
//!
//! - `POST /v1/parcels`: schedule a parcel for a client
//! - `GET /v1/parcels/:id`: parcel with its event history
//! - `PUT /v1/parcels/:id`: overwrite a parcel
//! - `POST /v1/parcels/delete`: delete a batch of parcels
//! - `POST /v1/parcels/query`: one page of the parcel table
//! - `POST /v1/parcels/ids`: every parcel id matching the filters, for bulk actions
//! - `GET /v1/parcels/live`: the parcel table as a server-sent event stream,
//!   refetched whenever a watched table changes

use std::convert::Infallible;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ErrorResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use foodbank_shared::{
    error::{DatabaseError, DbResultExt},
    forms::ParcelForm,
    models::{
        client::Client,
        event::ParcelEvent,
        parcel::Parcel,
    },
    paging::{Page, PageWindow},
    parcels_query::{
        fetch_matching_parcel_ids, fetch_parcels_page, ParcelsFilters, ParcelsQuery, ParcelsSort,
        ParcelsTableRow,
    },
    realtime::Debouncer,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Name of the SSE event carrying a fresh page
pub const PARCELS_PAGE_EVENT: &str = "parcels_page";

/// Name of the SSE event sent when a refetch fails
pub const PARCELS_ERROR_EVENT: &str = "parcels_error";

/// Filter, sort and window of one parcel table request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelsRequest {
    pub filters: ParcelsFilters,
    pub sort: ParcelsSort,
    pub window: PageWindow,
}

impl ParcelsRequest {
    fn into_query(self) -> Result<ParcelsQuery, ApiError> {
        Ok(ParcelsQuery::new(self.filters, self.sort, self.window)?)
    }
}

/// Filter and sort for bulk selection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchingIdsRequest {
    pub filters: ParcelsFilters,
    pub sort: ParcelsSort,
}

/// Query string of `GET /v1/parcels/live`
///
/// `query` is a JSON-encoded [`ParcelsRequest`]; absent means defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LiveParams {
    pub query: Option<String>,
}

impl LiveParams {
    fn into_query(self) -> Result<ParcelsQuery, ApiError> {
        let request = match self.query.as_deref() {
            Some(json) => serde_json::from_str::<ParcelsRequest>(json)
                .map_err(|e| ApiError::BadRequest(format!("Invalid parcel query: {}", e)))?,
            None => ParcelsRequest::default(),
        };
        request.into_query()
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteParcelsRequest {
    pub parcel_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DeleteParcelsResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct ParcelDetailResponse {
    pub parcel: Parcel,
    pub events: Vec<ParcelEvent>,
}

/// `POST /v1/parcels`
pub async fn create_parcel(
    State(state): State<AppState>,
    Json(form): Json<ParcelForm>,
) -> ApiResult<(StatusCode, Json<Parcel>)> {
    form.check()?;

    if Client::find_by_id(&state.db, form.client_id)
        .await
        .db_context("fetch client")?
        .is_none()
    {
        return Err(ApiError::NotFound("Client not found".to_string()));
    }

    let parcel = Parcel::create(&state.db, form.into_details())
        .await
        .db_context("create parcel")?;

    Ok((StatusCode::CREATED, Json(parcel)))
}

/// `GET /v1/parcels/:id`
pub async fn get_parcel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ParcelDetailResponse>> {
    let parcel = Parcel::find_by_id(&state.db, id)
        .await
        .db_context("fetch parcel")?
        .ok_or_else(|| ApiError::NotFound("Parcel not found".to_string()))?;

    let events = ParcelEvent::find_by_parcel(&state.db, id)
        .await
        .db_context("fetch parcel events")?;

    Ok(Json(ParcelDetailResponse { parcel, events }))
}

/// `PUT /v1/parcels/:id`
pub async fn update_parcel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<ParcelForm>,
) -> ApiResult<Json<Parcel>> {
    form.check()?;

    let parcel = Parcel::update(&state.db, id, form.into_details())
        .await
        .db_context("update parcel")?
        .ok_or_else(|| ApiError::NotFound("Parcel not found".to_string()))?;

    Ok(Json(parcel))
}

/// `POST /v1/parcels/delete`
pub async fn delete_parcels(
    State(state): State<AppState>,
    Json(req): Json<DeleteParcelsRequest>,
) -> ApiResult<Json<DeleteParcelsResponse>> {
    if req.parcel_ids.is_empty() {
        return Err(ApiError::BadRequest("No parcels selected".to_string()));
    }

    let deleted = Parcel::delete_many(&state.db, &req.parcel_ids)
        .await
        .db_context("delete parcels")?;

    Ok(Json(DeleteParcelsResponse { deleted }))
}

/// `POST /v1/parcels/query`
pub async fn query_parcels(
    State(state): State<AppState>,
    Json(req): Json<ParcelsRequest>,
) -> ApiResult<Json<Page<ParcelsTableRow>>> {
    let query = req.into_query()?;

    let page = fetch_parcels_page(&state.db, &query)
        .await
        .db_context("fetch parcels")?;

    Ok(Json(page))
}

/// `POST /v1/parcels/ids`
pub async fn matching_parcel_ids(
    State(state): State<AppState>,
    Json(req): Json<MatchingIdsRequest>,
) -> ApiResult<Json<Vec<Uuid>>> {
    let ids = fetch_matching_parcel_ids(&state.db, &req.filters, req.sort)
        .await
        .db_context("fetch parcel ids")?;

    Ok(Json(ids))
}

type PageResult = Result<Page<ParcelsTableRow>, DatabaseError>;

async fn load_page(pool: PgPool, query: ParcelsQuery, token: CancellationToken) -> Option<PageResult> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = fetch_parcels_page(&pool, &query) => Some(result.db_context("fetch parcels")),
    }
}

fn page_event(result: PageResult) -> Event {
    let event = match result {
        Ok(page) => Event::default().event(PARCELS_PAGE_EVENT).json_data(&page),
        Err(e) => Event::default().event(PARCELS_ERROR_EVENT).json_data(ErrorResponse {
            error: "database_error".to_string(),
            message: format!("Failed to {}", e.action),
            log_id: Some(e.log_id),
            details: None,
        }),
    };

    event.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize live parcels event");
        Event::default().event(PARCELS_ERROR_EVENT).data("serialization failed")
    })
}

/// `GET /v1/parcels/live`
///
/// Sends the first page immediately, then a new page after each burst of
/// table changes has been quiet for the configured debounce. A refetch still
/// running when the next one starts is cancelled and never delivered.
pub async fn live_parcels(
    State(state): State<AppState>,
    Query(params): Query<LiveParams>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let query = params.into_query()?;

    // Subscribe before the first fetch so no change is missed in between
    let changes = state.hub.subscribe();

    let first = fetch_parcels_page(&state.db, &query)
        .await
        .db_context("fetch parcels")?;

    let (tx, rx) = mpsc::channel::<Option<PageResult>>(4);
    let pool = state.db.clone();
    let debouncer = Debouncer::new(state.config.live_debounce());
    let shutdown = state.shutdown.child_token();

    tokio::spawn(async move {
        debouncer
            .run(
                changes,
                move |token| load_page(pool.clone(), query.clone(), token),
                tx,
                shutdown,
            )
            .await;
        tracing::debug!("Live parcels stream closed");
    });

    let updates = ReceiverStream::new(rx).filter_map(|result| async move { result.map(page_event) });
    let events = stream::once(async move { page_event(Ok(first)) })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodbank_shared::parcels_query::{LastStatusOption, ParcelsSortColumn};
    use foodbank_shared::paging::SortDirection;

    #[test]
    fn test_live_params_default_query() {
        let query = LiveParams::default().into_query().unwrap();
        assert_eq!(query.window(), PageWindow::default());
        assert_eq!(query.filters(), &ParcelsFilters::default());
    }

    #[test]
    fn test_live_params_parse_json() {
        let params = LiveParams {
            query: Some(
                r#"{
                    "filters": {"full_name": "ada", "last_status": ["NoStatus"]},
                    "sort": {"column": "full_name", "direction": "desc"},
                    "window": {"start": 25, "end": 49}
                }"#
                .to_string(),
            ),
        };

        let query = params.into_query().unwrap();
        assert_eq!(query.filters().full_name.as_deref(), Some("ada"));
        assert_eq!(
            query.filters().last_status,
            Some(vec![LastStatusOption::NoStatus])
        );
        assert_eq!(query.sort().column, ParcelsSortColumn::FullName);
        assert_eq!(query.sort().direction, SortDirection::Desc);
        assert_eq!(query.window(), PageWindow::new(25, 49).unwrap());
    }

    #[test]
    fn test_live_params_reject_bad_input() {
        let bad_json = LiveParams {
            query: Some("{not json".to_string()),
        };
        assert!(matches!(bad_json.into_query(), Err(ApiError::BadRequest(_))));

        let inverted = LiveParams {
            query: Some(r#"{"window": {"start": 10, "end": 0}}"#.to_string()),
        };
        assert!(matches!(inverted.into_query(), Err(ApiError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_load_page_cancelled_before_fetch() {
        let pool = PgPool::connect_lazy("postgresql://unused@localhost/unused").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let query = LiveParams::default().into_query().unwrap();
        assert!(load_page(pool, query, token).await.is_none());
    }
}
