//! Client model and database operations
//!
//! A client is one household registered with the foodbank. The household's
//! members live in `families`, keyed by the client's `family_id`, and are
//! written in the same transaction as the client row.
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::models::client::{Client, ClientDetails};
//! use foodbank_shared::models::family::{Gender, NewFamilyMember};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! let details = ClientDetails {
//!     full_name: "Ada Lovelace".to_string(),
//!     address_1: "1 Kennington Lane".to_string(),
//!     address_postcode: "SE11 5QY".to_string(),
//!     ..Default::default()
//! };
//! let family = vec![NewFamilyMember { gender: Gender::Female, age: None }];
//!
//! let (client, members) = Client::create(&pool, details, &family).await?;
//! assert_eq!(members.len(), 1);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::family::{FamilyMember, NewFamilyMember};
use crate::paging::{Page, PageWindow, SortDirection};

const CLIENT_COLUMNS: &str = "\
    primary_key, full_name, phone_number, address_1, address_2, address_town, \
    address_county, address_postcode, delivery_instructions, family_id, \
    dietary_requirements, feminine_products, baby_food, pet_food, other_items, \
    extra_information, flagged_for_attention, signposting_call_required, created_at";

/// Client (household) record
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub primary_key: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub address_1: String,
    pub address_2: String,
    pub address_town: String,
    pub address_county: String,
    pub address_postcode: String,
    pub delivery_instructions: String,

    /// Groups this client's rows in `families`
    pub family_id: Uuid,

    pub dietary_requirements: Vec<String>,
    pub feminine_products: Vec<String>,

    /// `None` when the client did not say
    pub baby_food: Option<bool>,

    pub pet_food: Vec<String>,
    pub other_items: Vec<String>,
    pub extra_information: String,
    pub flagged_for_attention: bool,
    pub signposting_call_required: bool,
    pub created_at: DateTime<Utc>,
}

/// Editable client fields, as submitted by the intake form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDetails {
    pub full_name: String,
    pub phone_number: String,
    pub address_1: String,
    pub address_2: String,
    pub address_town: String,
    pub address_county: String,
    pub address_postcode: String,
    pub delivery_instructions: String,
    pub dietary_requirements: Vec<String>,
    pub feminine_products: Vec<String>,
    pub baby_food: Option<bool>,
    pub pet_food: Vec<String>,
    pub other_items: Vec<String>,
    pub extra_information: String,
    pub flagged_for_attention: bool,
    pub signposting_call_required: bool,
}

/// Sortable columns of the client table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientSortColumn {
    #[default]
    FullName,
    AddressPostcode,
    CreatedAt,
}

impl ClientSortColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            ClientSortColumn::FullName => "full_name",
            ClientSortColumn::AddressPostcode => "address_postcode",
            ClientSortColumn::CreatedAt => "created_at",
        }
    }
}

/// Filters for the client table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientFilters {
    /// Case-insensitive substring of the full name
    pub full_name: Option<String>,

    /// Case-insensitive substring of the postcode
    pub address_postcode: Option<String>,
}

/// Row shown in the client table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClientSummary {
    pub primary_key: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub address_postcode: String,
    pub family_count: i64,
    pub flagged_for_attention: bool,
}

fn push_client_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &ClientFilters) {
    builder.push(" WHERE TRUE");

    if let Some(name) = filters.full_name.as_deref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(" AND c.full_name ILIKE ")
            .push_bind(format!("%{}%", name.trim()));
    }
    if let Some(postcode) = filters
        .address_postcode
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        builder
            .push(" AND c.address_postcode ILIKE ")
            .push_bind(format!("%{}%", postcode.trim()));
    }
}

impl Client {
    /// Creates a client and its household in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if either insert fails; nothing is written in that case.
    pub async fn create(
        pool: &PgPool,
        details: ClientDetails,
        family: &[NewFamilyMember],
    ) -> Result<(Self, Vec<FamilyMember>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (
                full_name, phone_number, address_1, address_2, address_town,
                address_county, address_postcode, delivery_instructions,
                dietary_requirements, feminine_products, baby_food, pet_food,
                other_items, extra_information, flagged_for_attention,
                signposting_call_required
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(details.full_name)
        .bind(details.phone_number)
        .bind(details.address_1)
        .bind(details.address_2)
        .bind(details.address_town)
        .bind(details.address_county)
        .bind(details.address_postcode)
        .bind(details.delivery_instructions)
        .bind(details.dietary_requirements)
        .bind(details.feminine_products)
        .bind(details.baby_food)
        .bind(details.pet_food)
        .bind(details.other_items)
        .bind(details.extra_information)
        .bind(details.flagged_for_attention)
        .bind(details.signposting_call_required)
        .fetch_one(&mut *tx)
        .await?;

        let members = FamilyMember::replace_for_family(&mut tx, client.family_id, family).await?;

        tx.commit().await?;

        tracing::info!(client_id = %client.primary_key, family_size = members.len(), "Created client");
        Ok((client, members))
    }

    /// Finds a client by primary key
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE primary_key = $1",
            CLIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(client)
    }

    /// Finds several clients by primary key
    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE primary_key = ANY($1)",
            CLIENT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(clients)
    }

    /// Overwrites a client's details and household
    ///
    /// Returns `None` when the client does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        details: ClientDetails,
        family: &[NewFamilyMember],
    ) -> Result<Option<(Self, Vec<FamilyMember>)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET
                full_name = $2, phone_number = $3, address_1 = $4, address_2 = $5,
                address_town = $6, address_county = $7, address_postcode = $8,
                delivery_instructions = $9, dietary_requirements = $10,
                feminine_products = $11, baby_food = $12, pet_food = $13,
                other_items = $14, extra_information = $15,
                flagged_for_attention = $16, signposting_call_required = $17
            WHERE primary_key = $1
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(id)
        .bind(details.full_name)
        .bind(details.phone_number)
        .bind(details.address_1)
        .bind(details.address_2)
        .bind(details.address_town)
        .bind(details.address_county)
        .bind(details.address_postcode)
        .bind(details.delivery_instructions)
        .bind(details.dietary_requirements)
        .bind(details.feminine_products)
        .bind(details.baby_food)
        .bind(details.pet_food)
        .bind(details.other_items)
        .bind(details.extra_information)
        .bind(details.flagged_for_attention)
        .bind(details.signposting_call_required)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(client) = client else {
            tx.rollback().await?;
            return Ok(None);
        };

        let members = FamilyMember::replace_for_family(&mut tx, client.family_id, family).await?;

        tx.commit().await?;

        Ok(Some((client, members)))
    }

    /// Deletes a client; parcels, events and family rows cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE primary_key = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists clients for the client table
    pub async fn list(
        pool: &PgPool,
        filters: &ClientFilters,
        sort: ClientSortColumn,
        direction: SortDirection,
        window: PageWindow,
    ) -> Result<Page<ClientSummary>, sqlx::Error> {
        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM clients c");
        push_client_filters(&mut count_query, filters);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT c.primary_key, c.full_name, c.phone_number, c.address_postcode,
                   (SELECT COUNT(*) FROM families f WHERE f.family_id = c.family_id) AS family_count,
                   c.flagged_for_attention
            FROM clients c"#,
        );
        push_client_filters(&mut query, filters);
        query
            .push(" ORDER BY c.")
            .push(sort.as_sql())
            .push(" ")
            .push(direction.as_sql())
            .push(", c.primary_key ASC LIMIT ")
            .push_bind(window.limit())
            .push(" OFFSET ")
            .push_bind(window.offset());

        let rows = query
            .build_query_as::<ClientSummary>()
            .fetch_all(pool)
            .await?;

        Ok(Page {
            rows,
            total,
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_details_default() {
        let details = ClientDetails::default();
        assert!(details.full_name.is_empty());
        assert!(details.baby_food.is_none());
        assert!(!details.flagged_for_attention);
    }

    #[test]
    fn test_client_details_deserialize_partial() {
        let details: ClientDetails = serde_json::from_str(
            r#"{"full_name": "Ada", "address_1": "1 Lane", "address_postcode": "SE11 5QY", "baby_food": true}"#,
        )
        .unwrap();
        assert_eq!(details.full_name, "Ada");
        assert_eq!(details.baby_food, Some(true));
        assert!(details.pet_food.is_empty());
    }

    #[test]
    fn test_filters_compose_predicates() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM clients c");
        push_client_filters(
            &mut builder,
            &ClientFilters {
                full_name: Some(" ada ".to_string()),
                address_postcode: Some("".to_string()),
            },
        );
        let sql = builder.sql();
        assert!(sql.contains("c.full_name ILIKE $1"));
        assert!(!sql.contains("address_postcode"));
    }
}
