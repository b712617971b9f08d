//! Shopping list items
//!
//! Each row is one item on the shopping list with a quantity (and optional
//! note) for every household size from 1 to 10+. The shopping list PDF picks
//! the column matching the client's household size.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Number of household-size columns (1..=10, where 10 means 10+)
pub const HOUSEHOLD_SIZES: usize = 10;

const LIST_COLUMNS: &str = "\
    primary_key, item_name, row_order, \
    quantity_for_1, quantity_for_2, quantity_for_3, quantity_for_4, quantity_for_5, \
    quantity_for_6, quantity_for_7, quantity_for_8, quantity_for_9, quantity_for_10, \
    notes_for_1, notes_for_2, notes_for_3, notes_for_4, notes_for_5, \
    notes_for_6, notes_for_7, notes_for_8, notes_for_9, notes_for_10";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListItem {
    pub primary_key: Uuid,
    pub item_name: String,
    pub row_order: i32,
    pub quantity_for_1: String,
    pub quantity_for_2: String,
    pub quantity_for_3: String,
    pub quantity_for_4: String,
    pub quantity_for_5: String,
    pub quantity_for_6: String,
    pub quantity_for_7: String,
    pub quantity_for_8: String,
    pub quantity_for_9: String,
    pub quantity_for_10: String,
    pub notes_for_1: Option<String>,
    pub notes_for_2: Option<String>,
    pub notes_for_3: Option<String>,
    pub notes_for_4: Option<String>,
    pub notes_for_5: Option<String>,
    pub notes_for_6: Option<String>,
    pub notes_for_7: Option<String>,
    pub notes_for_8: Option<String>,
    pub notes_for_9: Option<String>,
    pub notes_for_10: Option<String>,
}

/// Editable list item fields
///
/// `quantities[i]` and `notes[i]` belong to household size `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemDetails {
    pub item_name: String,
    pub row_order: i32,
    pub quantities: [String; HOUSEHOLD_SIZES],
    pub notes: [Option<String>; HOUSEHOLD_SIZES],
}

/// Clamps a household size to a list column (1..=10)
pub fn household_column(family_size: i64) -> usize {
    family_size.clamp(1, HOUSEHOLD_SIZES as i64) as usize
}

impl ListItem {
    /// Quantity for a household of `family_size` people
    pub fn quantity_for(&self, family_size: i64) -> &str {
        match household_column(family_size) {
            1 => &self.quantity_for_1,
            2 => &self.quantity_for_2,
            3 => &self.quantity_for_3,
            4 => &self.quantity_for_4,
            5 => &self.quantity_for_5,
            6 => &self.quantity_for_6,
            7 => &self.quantity_for_7,
            8 => &self.quantity_for_8,
            9 => &self.quantity_for_9,
            _ => &self.quantity_for_10,
        }
    }

    /// Note for a household of `family_size` people
    pub fn notes_for(&self, family_size: i64) -> Option<&str> {
        match household_column(family_size) {
            1 => self.notes_for_1.as_deref(),
            2 => self.notes_for_2.as_deref(),
            3 => self.notes_for_3.as_deref(),
            4 => self.notes_for_4.as_deref(),
            5 => self.notes_for_5.as_deref(),
            6 => self.notes_for_6.as_deref(),
            7 => self.notes_for_7.as_deref(),
            8 => self.notes_for_8.as_deref(),
            9 => self.notes_for_9.as_deref(),
            _ => self.notes_for_10.as_deref(),
        }
    }

    /// Lists every item in display order
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ListItem>(&format!(
            "SELECT {} FROM lists ORDER BY row_order, item_name",
            LIST_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    /// Creates an item
    pub async fn create(pool: &PgPool, data: ListItemDetails) -> Result<Self, sqlx::Error> {
        let [q1, q2, q3, q4, q5, q6, q7, q8, q9, q10] = data.quantities;
        let [n1, n2, n3, n4, n5, n6, n7, n8, n9, n10] = data.notes;

        sqlx::query_as::<_, ListItem>(&format!(
            r#"
            INSERT INTO lists (
                item_name, row_order,
                quantity_for_1, quantity_for_2, quantity_for_3, quantity_for_4, quantity_for_5,
                quantity_for_6, quantity_for_7, quantity_for_8, quantity_for_9, quantity_for_10,
                notes_for_1, notes_for_2, notes_for_3, notes_for_4, notes_for_5,
                notes_for_6, notes_for_7, notes_for_8, notes_for_9, notes_for_10
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING {}
            "#,
            LIST_COLUMNS
        ))
        .bind(data.item_name)
        .bind(data.row_order)
        .bind(q1)
        .bind(q2)
        .bind(q3)
        .bind(q4)
        .bind(q5)
        .bind(q6)
        .bind(q7)
        .bind(q8)
        .bind(q9)
        .bind(q10)
        .bind(n1)
        .bind(n2)
        .bind(n3)
        .bind(n4)
        .bind(n5)
        .bind(n6)
        .bind(n7)
        .bind(n8)
        .bind(n9)
        .bind(n10)
        .fetch_one(pool)
        .await
    }

    /// Overwrites an item; `None` if it does not exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: ListItemDetails,
    ) -> Result<Option<Self>, sqlx::Error> {
        let [q1, q2, q3, q4, q5, q6, q7, q8, q9, q10] = data.quantities;
        let [n1, n2, n3, n4, n5, n6, n7, n8, n9, n10] = data.notes;

        sqlx::query_as::<_, ListItem>(&format!(
            r#"
            UPDATE lists SET
                item_name = $2, row_order = $3,
                quantity_for_1 = $4, quantity_for_2 = $5, quantity_for_3 = $6,
                quantity_for_4 = $7, quantity_for_5 = $8, quantity_for_6 = $9,
                quantity_for_7 = $10, quantity_for_8 = $11, quantity_for_9 = $12,
                quantity_for_10 = $13,
                notes_for_1 = $14, notes_for_2 = $15, notes_for_3 = $16,
                notes_for_4 = $17, notes_for_5 = $18, notes_for_6 = $19,
                notes_for_7 = $20, notes_for_8 = $21, notes_for_9 = $22,
                notes_for_10 = $23
            WHERE primary_key = $1
            RETURNING {}
            "#,
            LIST_COLUMNS
        ))
        .bind(id)
        .bind(data.item_name)
        .bind(data.row_order)
        .bind(q1)
        .bind(q2)
        .bind(q3)
        .bind(q4)
        .bind(q5)
        .bind(q6)
        .bind(q7)
        .bind(q8)
        .bind(q9)
        .bind(q10)
        .bind(n1)
        .bind(n2)
        .bind(n3)
        .bind(n4)
        .bind(n5)
        .bind(n6)
        .bind(n7)
        .bind(n8)
        .bind(n9)
        .bind(n10)
        .fetch_optional(pool)
        .await
    }

    /// Deletes an item
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lists WHERE primary_key = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Swaps the display positions of two items in one statement
    ///
    /// Returns false if either item is missing; nothing changes then.
    pub async fn swap_row_order(pool: &PgPool, first: Uuid, second: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE lists AS l
            SET row_order = other.row_order
            FROM lists AS other
            WHERE (l.primary_key = $1 AND other.primary_key = $2)
               OR (l.primary_key = $2 AND other.primary_key = $1)
            "#,
        )
        .bind(first)
        .bind(second)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ListItem {
        ListItem {
            primary_key: Uuid::new_v4(),
            item_name: "Tinned beans".to_string(),
            row_order: 1,
            quantity_for_1: "1".to_string(),
            quantity_for_2: "2".to_string(),
            quantity_for_3: "2".to_string(),
            quantity_for_4: "3".to_string(),
            quantity_for_5: "3".to_string(),
            quantity_for_6: "4".to_string(),
            quantity_for_7: "4".to_string(),
            quantity_for_8: "5".to_string(),
            quantity_for_9: "5".to_string(),
            quantity_for_10: "6".to_string(),
            notes_for_1: None,
            notes_for_2: None,
            notes_for_3: None,
            notes_for_4: None,
            notes_for_5: None,
            notes_for_6: None,
            notes_for_7: None,
            notes_for_8: None,
            notes_for_9: None,
            notes_for_10: Some("Large tins".to_string()),
        }
    }

    #[test]
    fn test_household_column_clamps() {
        assert_eq!(household_column(0), 1);
        assert_eq!(household_column(1), 1);
        assert_eq!(household_column(7), 7);
        assert_eq!(household_column(14), 10);
    }

    #[test]
    fn test_quantity_and_notes_for() {
        let item = item();
        assert_eq!(item.quantity_for(1), "1");
        assert_eq!(item.quantity_for(4), "3");
        assert_eq!(item.quantity_for(12), "6");
        assert_eq!(item.notes_for(3), None);
        assert_eq!(item.notes_for(11), Some("Large tins"));
    }
}
