//! Named free-text settings used by the generated documents
//!
//! Known entries are seeded by the migrations: [`SHOPPING_LIST_FOOTER`] and
//! [`DRIVER_OVERVIEW_MESSAGE`].

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

pub const SHOPPING_LIST_FOOTER: &str = "shopping_list_footer";
pub const DRIVER_OVERVIEW_MESSAGE: &str = "driver_overview_message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebsiteData {
    pub name: String,
    pub value: String,
}

impl WebsiteData {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WebsiteData>("SELECT name, value FROM website_data ORDER BY name")
            .fetch_all(pool)
            .await
    }

    /// Value of one entry, `None` if it was never set
    pub async fn get(pool: &PgPool, name: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM website_data WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Value of one entry, empty when unset
    pub async fn get_or_empty(pool: &PgPool, name: &str) -> Result<String, sqlx::Error> {
        Ok(Self::get(pool, name).await?.unwrap_or_default())
    }

    /// Inserts or overwrites an entry
    pub async fn upsert(pool: &PgPool, name: &str, value: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, WebsiteData>(
            r#"
            INSERT INTO website_data (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
            RETURNING name, value
            "#,
        )
        .bind(name)
        .bind(value)
        .fetch_one(pool)
        .await
    }
}
