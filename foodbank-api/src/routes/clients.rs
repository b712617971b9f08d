//! Client intake endpoints
//!
//! - `GET /v1/clients`: search, sort and page the client table
//! - `POST /v1/clients`: create a client and its household
//! - `GET /v1/clients/:id`: client detail with household and parcels
//! - `PUT /v1/clients/:id`: overwrite a client and replace its household
//! - `DELETE /v1/clients/:id`: remove a client (parcels and events cascade)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use foodbank_shared::{
    error::DbResultExt,
    format::{format_address_from_client_details, format_breakdown_of_children, format_household_from_family_details},
    forms::ClientForm,
    models::{
        client::{Client, ClientFilters, ClientSortColumn, ClientSummary},
        family::FamilyMember,
        parcel::Parcel,
    },
    paging::{Page, PageWindow, PageWindowError, SortDirection},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query string of `GET /v1/clients`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListClientsParams {
    pub full_name: Option<String>,
    pub address_postcode: Option<String>,
    pub sort: ClientSortColumn,
    pub direction: SortDirection,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl ListClientsParams {
    fn window(&self) -> Result<PageWindow, ApiError> {
        let default = PageWindow::default();
        let start = self.start.unwrap_or(default.start);
        let end = match self.end {
            Some(end) => end,
            None => start
                .checked_add(default.limit() - 1)
                .ok_or(PageWindowError::OutOfRange)?,
        };
        Ok(PageWindow::new(start, end)?)
    }
}

/// Client with everything the detail page shows
#[derive(Debug, Serialize)]
pub struct ClientDetailResponse {
    pub client: Client,
    pub address: String,
    pub family: Vec<FamilyMember>,
    pub household: String,
    pub children: String,
    pub parcels: Vec<Parcel>,
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub client: Client,
    pub family: Vec<FamilyMember>,
}

/// `GET /v1/clients`
pub async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListClientsParams>,
) -> ApiResult<Json<Page<ClientSummary>>> {
    let window = params.window()?;
    let filters = ClientFilters {
        full_name: params.full_name,
        address_postcode: params.address_postcode,
    };

    let page = Client::list(&state.db, &filters, params.sort, params.direction, window)
        .await
        .db_context("fetch clients")?;

    Ok(Json(page))
}

/// `POST /v1/clients`
pub async fn create_client(
    State(state): State<AppState>,
    Json(form): Json<ClientForm>,
) -> ApiResult<(StatusCode, Json<ClientResponse>)> {
    form.check()?;
    let (details, family) = form.into_parts();

    let (client, family) = Client::create(&state.db, details, &family)
        .await
        .db_context("create client")?;

    tracing::info!(client_id = %client.primary_key, household = family.len(), "Client created");

    Ok((StatusCode::CREATED, Json(ClientResponse { client, family })))
}

/// `GET /v1/clients/:id`
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientDetailResponse>> {
    let client = Client::find_by_id(&state.db, id)
        .await
        .db_context("fetch client")?
        .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))?;

    let family = FamilyMember::find_by_family_id(&state.db, client.family_id)
        .await
        .db_context("fetch family")?;

    let parcels = Parcel::find_by_client(&state.db, client.primary_key)
        .await
        .db_context("fetch client parcels")?;

    Ok(Json(ClientDetailResponse {
        address: format_address_from_client_details(&client),
        household: format_household_from_family_details(&family),
        children: format_breakdown_of_children(&family),
        client,
        family,
        parcels,
    }))
}

/// `PUT /v1/clients/:id`
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<ClientForm>,
) -> ApiResult<Json<ClientResponse>> {
    form.check()?;
    let (details, family) = form.into_parts();

    let (client, family) = Client::update(&state.db, id, details, &family)
        .await
        .db_context("update client")?
        .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))?;

    Ok(Json(ClientResponse { client, family }))
}

/// `DELETE /v1/clients/:id`
pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = Client::delete(&state.db, id)
        .await
        .db_context("delete client")?;

    if !deleted {
        return Err(ApiError::NotFound("Client not found".to_string()));
    }

    tracing::info!(client_id = %id, "Client deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let params = ListClientsParams::default();
        assert_eq!(params.window().unwrap(), PageWindow::default());
    }

    #[test]
    fn test_window_from_start_only() {
        let params = ListClientsParams {
            start: Some(50),
            ..Default::default()
        };
        assert_eq!(params.window().unwrap(), PageWindow::new(50, 74).unwrap());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let params = ListClientsParams {
            start: Some(10),
            end: Some(5),
            ..Default::default()
        };
        assert!(matches!(params.window(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_start_near_max_rejected() {
        let params = ListClientsParams {
            start: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(params.window(), Err(ApiError::ValidationError(_))));

        let params = ListClientsParams {
            start: Some(0),
            end: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(params.window(), Err(ApiError::ValidationError(_))));
    }
}
