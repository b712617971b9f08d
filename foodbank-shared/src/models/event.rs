//! Parcel status events
//!
//! Every status change on a parcel is an appended row in `events`; the
//! parcel's current status is its most recent event. Nothing is updated in
//! place.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE events (
//!     primary_key UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     parcel_id UUID NOT NULL REFERENCES parcels (primary_key) ON DELETE CASCADE,
//!     event_name TEXT NOT NULL,
//!     timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     event_data TEXT NOT NULL DEFAULT ''
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::models::event::{ParcelEvent, ParcelStatus};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, parcel_ids: Vec<Uuid>) -> Result<(), sqlx::Error> {
//! let events = ParcelEvent::record(&pool, &parcel_ids, ParcelStatus::OutForDelivery, "Driver: Sam").await?;
//! assert_eq!(events.len(), parcel_ids.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Known parcel statuses, in workflow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelStatus {
    #[serde(rename = "Request Denied")]
    RequestDenied,
    #[serde(rename = "Pending More Info")]
    PendingMoreInfo,
    #[serde(rename = "Called and Confirmed")]
    CalledAndConfirmed,
    #[serde(rename = "Called and No Response")]
    CalledAndNoResponse,
    #[serde(rename = "Shopping List Downloaded")]
    ShoppingListDownloaded,
    #[serde(rename = "Ready to Dispatch")]
    ReadyToDispatch,
    #[serde(rename = "Received by Centre")]
    ReceivedByCentre,
    #[serde(rename = "Collection Failed")]
    CollectionFailed,
    #[serde(rename = "Parcel Collected")]
    ParcelCollected,
    #[serde(rename = "Shipping Labels Downloaded")]
    ShippingLabelsDownloaded,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Delivery Failed")]
    DeliveryFailed,
    #[serde(rename = "Delivery Cancelled")]
    DeliveryCancelled,
    #[serde(rename = "Fulfilled with Trussell Trust")]
    FulfilledWithTrussellTrust,
    #[serde(rename = "Driver Overview Downloaded")]
    DriverOverviewDownloaded,
    #[serde(rename = "Day Overview Downloaded")]
    DayOverviewDownloaded,
}

impl ParcelStatus {
    /// All statuses in workflow order
    pub const ALL: [ParcelStatus; 17] = [
        ParcelStatus::RequestDenied,
        ParcelStatus::PendingMoreInfo,
        ParcelStatus::CalledAndConfirmed,
        ParcelStatus::CalledAndNoResponse,
        ParcelStatus::ShoppingListDownloaded,
        ParcelStatus::ReadyToDispatch,
        ParcelStatus::ReceivedByCentre,
        ParcelStatus::CollectionFailed,
        ParcelStatus::ParcelCollected,
        ParcelStatus::ShippingLabelsDownloaded,
        ParcelStatus::OutForDelivery,
        ParcelStatus::Delivered,
        ParcelStatus::DeliveryFailed,
        ParcelStatus::DeliveryCancelled,
        ParcelStatus::FulfilledWithTrussellTrust,
        ParcelStatus::DriverOverviewDownloaded,
        ParcelStatus::DayOverviewDownloaded,
    ];

    /// Name stored in `events.event_name`
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::RequestDenied => "Request Denied",
            ParcelStatus::PendingMoreInfo => "Pending More Info",
            ParcelStatus::CalledAndConfirmed => "Called and Confirmed",
            ParcelStatus::CalledAndNoResponse => "Called and No Response",
            ParcelStatus::ShoppingListDownloaded => "Shopping List Downloaded",
            ParcelStatus::ReadyToDispatch => "Ready to Dispatch",
            ParcelStatus::ReceivedByCentre => "Received by Centre",
            ParcelStatus::CollectionFailed => "Collection Failed",
            ParcelStatus::ParcelCollected => "Parcel Collected",
            ParcelStatus::ShippingLabelsDownloaded => "Shipping Labels Downloaded",
            ParcelStatus::OutForDelivery => "Out for Delivery",
            ParcelStatus::Delivered => "Delivered",
            ParcelStatus::DeliveryFailed => "Delivery Failed",
            ParcelStatus::DeliveryCancelled => "Delivery Cancelled",
            ParcelStatus::FulfilledWithTrussellTrust => "Fulfilled with Trussell Trust",
            ParcelStatus::DriverOverviewDownloaded => "Driver Overview Downloaded",
            ParcelStatus::DayOverviewDownloaded => "Day Overview Downloaded",
        }
    }

    /// Parses a stored event name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == name)
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status event on a parcel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParcelEvent {
    pub primary_key: Uuid,
    pub parcel_id: Uuid,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,

    /// Free text attached to the event, e.g. the driver's name
    pub event_data: String,
}

impl ParcelEvent {
    /// Appends the same status to every listed parcel in one insert
    pub async fn record(
        pool: &PgPool,
        parcel_ids: &[Uuid],
        status: ParcelStatus,
        event_data: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if parcel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO events (parcel_id, event_name, event_data) ");
        builder.push_values(parcel_ids, |mut row, parcel_id| {
            row.push_bind(*parcel_id)
                .push_bind(status.as_str())
                .push_bind(event_data.to_string());
        });
        builder.push(" RETURNING primary_key, parcel_id, event_name, timestamp, event_data");

        let events = builder
            .build_query_as::<ParcelEvent>()
            .fetch_all(pool)
            .await?;

        tracing::info!(
            status = %status,
            parcels = parcel_ids.len(),
            "Recorded parcel status"
        );

        Ok(events)
    }

    /// Event history of one parcel, newest first
    pub async fn find_by_parcel(pool: &PgPool, parcel_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ParcelEvent>(
            r#"
            SELECT primary_key, parcel_id, event_name, timestamp, event_data
            FROM events
            WHERE parcel_id = $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(parcel_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_round_trip() {
        for status in ParcelStatus::ALL {
            assert_eq!(ParcelStatus::from_name(status.as_str()), Some(status));
        }
        assert_eq!(ParcelStatus::from_name("Lost in Space"), None);
    }

    #[test]
    fn test_status_serde_matches_stored_name() {
        let json = serde_json::to_string(&ParcelStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"Out for Delivery\"");

        let parsed: ParcelStatus = serde_json::from_str("\"Called and Confirmed\"").unwrap();
        assert_eq!(parsed, ParcelStatus::CalledAndConfirmed);
    }
}
