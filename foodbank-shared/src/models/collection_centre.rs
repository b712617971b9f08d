//! Collection centre model
//!
//! Physical sites where parcels are picked up. The centre named
//! [`DELIVERY_CENTRE_NAME`] stands for home delivery.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Name of the pseudo-centre used for delivered parcels
pub const DELIVERY_CENTRE_NAME: &str = "Delivery";

/// Collection centre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CollectionCentre {
    pub primary_key: Uuid,
    pub name: String,
    pub acronym: String,
}

/// Input for creating a collection centre
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCollectionCentre {
    pub name: String,
    pub acronym: String,
}

impl CollectionCentre {
    /// Whether parcels at this centre are delivered rather than collected
    pub fn is_delivery(&self) -> bool {
        self.name == DELIVERY_CENTRE_NAME
    }

    /// Lists all centres by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CollectionCentre>(
            "SELECT primary_key, name, acronym FROM collection_centres ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }

    /// Finds a centre by primary key
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CollectionCentre>(
            "SELECT primary_key, name, acronym FROM collection_centres WHERE primary_key = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Creates a centre
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name or acronym (unique constraint).
    pub async fn create(pool: &PgPool, data: CreateCollectionCentre) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CollectionCentre>(
            r#"
            INSERT INTO collection_centres (name, acronym)
            VALUES ($1, $2)
            RETURNING primary_key, name, acronym
            "#,
        )
        .bind(data.name)
        .bind(data.acronym)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_delivery() {
        let centre = CollectionCentre {
            primary_key: Uuid::new_v4(),
            name: DELIVERY_CENTRE_NAME.to_string(),
            acronym: "DLVR".to_string(),
        };
        assert!(centre.is_delivery());

        let hall = CollectionCentre {
            name: "Vauxhall Hope Church".to_string(),
            acronym: "VHC".to_string(),
            ..centre
        };
        assert!(!hall.is_delivery());
    }
}
