//! Parcel model and database operations
//!
//! A parcel is one scheduled food collection or delivery for a client.
//! Status lives in the `events` table; see [`super::event`].
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE parcels (
//!     primary_key UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     client_id UUID NOT NULL REFERENCES clients (primary_key) ON DELETE CASCADE,
//!     packing_date TIMESTAMPTZ NOT NULL,
//!     packing_slot TEXT,
//!     voucher_number TEXT,
//!     collection_centre UUID REFERENCES collection_centres (primary_key) ON DELETE SET NULL,
//!     collection_datetime TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const PARCEL_COLUMNS: &str = "\
    primary_key, client_id, packing_date, packing_slot, voucher_number, \
    collection_centre, collection_datetime, created_at";

/// Parcel record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Parcel {
    pub primary_key: Uuid,
    pub client_id: Uuid,
    pub packing_date: DateTime<Utc>,
    pub packing_slot: Option<String>,
    pub voucher_number: Option<String>,
    pub collection_centre: Option<Uuid>,
    pub collection_datetime: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Editable parcel fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelDetails {
    pub client_id: Uuid,
    pub packing_date: DateTime<Utc>,
    pub packing_slot: Option<String>,
    pub voucher_number: Option<String>,
    pub collection_centre: Option<Uuid>,
    pub collection_datetime: Option<DateTime<Utc>>,
}

/// Parcel joined with its client and centre, for documents and the calendar
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParcelWithClient {
    pub parcel_id: Uuid,
    pub client_id: Uuid,
    pub full_name: String,
    pub packing_date: DateTime<Utc>,
    pub packing_slot: Option<String>,
    pub voucher_number: Option<String>,
    pub collection_datetime: Option<DateTime<Utc>>,
    pub collection_centre_name: Option<String>,
    pub collection_centre_acronym: Option<String>,
}

impl Parcel {
    /// Creates a parcel
    ///
    /// # Errors
    ///
    /// Fails when the client or centre does not exist (foreign key).
    pub async fn create(pool: &PgPool, data: ParcelDetails) -> Result<Self, sqlx::Error> {
        let parcel = sqlx::query_as::<_, Parcel>(&format!(
            r#"
            INSERT INTO parcels (
                client_id, packing_date, packing_slot, voucher_number,
                collection_centre, collection_datetime
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PARCEL_COLUMNS
        ))
        .bind(data.client_id)
        .bind(data.packing_date)
        .bind(data.packing_slot)
        .bind(data.voucher_number)
        .bind(data.collection_centre)
        .bind(data.collection_datetime)
        .fetch_one(pool)
        .await?;

        tracing::info!(parcel_id = %parcel.primary_key, client_id = %parcel.client_id, "Created parcel");
        Ok(parcel)
    }

    /// Finds a parcel by primary key
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            "SELECT {} FROM parcels WHERE primary_key = $1",
            PARCEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds several parcels, preserving no particular order
    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            "SELECT {} FROM parcels WHERE primary_key = ANY($1)",
            PARCEL_COLUMNS
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Lists a client's parcels, latest packing date first
    pub async fn find_by_client(pool: &PgPool, client_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            "SELECT {} FROM parcels WHERE client_id = $1 ORDER BY packing_date DESC",
            PARCEL_COLUMNS
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    /// Overwrites a parcel's fields; `None` if it does not exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: ParcelDetails,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            r#"
            UPDATE parcels SET
                client_id = $2, packing_date = $3, packing_slot = $4,
                voucher_number = $5, collection_centre = $6, collection_datetime = $7
            WHERE primary_key = $1
            RETURNING {}
            "#,
            PARCEL_COLUMNS
        ))
        .bind(id)
        .bind(data.client_id)
        .bind(data.packing_date)
        .bind(data.packing_slot)
        .bind(data.voucher_number)
        .bind(data.collection_centre)
        .bind(data.collection_datetime)
        .fetch_optional(pool)
        .await
    }

    /// Deletes parcels in one statement, returning how many were removed
    pub async fn delete_many(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM parcels WHERE primary_key = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;

        tracing::info!(requested = ids.len(), deleted = result.rows_affected(), "Deleted parcels");
        Ok(result.rows_affected())
    }
}

impl ParcelWithClient {
    const SELECT: &'static str = r#"
        SELECT p.primary_key AS parcel_id, c.primary_key AS client_id, c.full_name,
               p.packing_date, p.packing_slot, p.voucher_number, p.collection_datetime,
               cc.name AS collection_centre_name, cc.acronym AS collection_centre_acronym
        FROM parcels p
        JOIN clients c ON c.primary_key = p.client_id
        LEFT JOIN collection_centres cc ON cc.primary_key = p.collection_centre"#;

    /// Parcels whose collection datetime falls in `[start, end)`
    pub async fn collections_between(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ParcelWithClient>(&format!(
            "{} WHERE p.collection_datetime >= $1 AND p.collection_datetime < $2 \
             ORDER BY p.collection_datetime, c.full_name",
            Self::SELECT
        ))
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parcel_details_deserialize() {
        let json = serde_json::json!({
            "client_id": "550e8400-e29b-41d4-a716-446655440000",
            "packing_date": "2024-03-01T10:00:00Z",
            "packing_slot": "AM",
            "voucher_number": null,
            "collection_centre": null,
            "collection_datetime": null
        });
        let details: ParcelDetails = serde_json::from_value(json).unwrap();
        assert_eq!(details.packing_slot.as_deref(), Some("AM"));
        assert!(details.collection_centre.is_none());
    }
}
