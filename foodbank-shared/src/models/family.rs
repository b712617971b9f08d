//! Family member model and database operations
//!
//! A client's household is stored as one row per member, grouped by the
//! client's `family_id`. Members with no age recorded are adults.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE gender AS ENUM ('male', 'female', 'other');
//!
//! CREATE TABLE families (
//!     primary_key UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     family_id UUID NOT NULL REFERENCES clients (family_id) ON DELETE CASCADE,
//!     gender gender NOT NULL DEFAULT 'other',
//!     age INTEGER CHECK (age IS NULL OR age >= 0)
//! );
//! ```

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Gender recorded for a household member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// One member of a client's household
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamilyMember {
    /// Row ID
    pub primary_key: Uuid,

    /// Household this member belongs to (the client's `family_id`)
    pub family_id: Uuid,

    /// Gender
    pub gender: Gender,

    /// Age in years; `None` for adults whose age was not recorded
    pub age: Option<i32>,
}

/// Input for a household member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFamilyMember {
    pub gender: Gender,
    pub age: Option<i32>,
}

impl FamilyMember {
    /// Lists the members of one household, adults first
    pub async fn find_by_family_id(
        pool: &PgPool,
        family_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT primary_key, family_id, gender, age
            FROM families
            WHERE family_id = $1
            ORDER BY age DESC NULLS FIRST, primary_key
            "#,
        )
        .bind(family_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Lists members for several households at once
    pub async fn find_by_family_ids(
        pool: &PgPool,
        family_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT primary_key, family_id, gender, age
            FROM families
            WHERE family_id = ANY($1)
            ORDER BY family_id, age DESC NULLS FIRST, primary_key
            "#,
        )
        .bind(family_ids)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Replaces every member of a household
    ///
    /// Runs on a caller-supplied connection so client create/update can wrap
    /// it in the same transaction as the client row.
    pub async fn replace_for_family(
        conn: &mut PgConnection,
        family_id: Uuid,
        members: &[NewFamilyMember],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query("DELETE FROM families WHERE family_id = $1")
            .bind(family_id)
            .execute(&mut *conn)
            .await?;

        if members.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO families (family_id, gender, age) ");
        builder.push_values(members, |mut row, member| {
            row.push_bind(family_id)
                .push_bind(member.gender)
                .push_bind(member.age);
        });
        builder.push(" RETURNING primary_key, family_id, gender, age");

        let inserted = builder
            .build_query_as::<FamilyMember>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(inserted)
    }
}
