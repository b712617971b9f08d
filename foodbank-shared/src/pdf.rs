//! Document view models
//!
//! Builds the data behind the four printable documents: shopping lists,
//! shipping labels, the driver overview and the day overview. Builders are
//! pure functions over [`ParcelDocumentData`]; [`load_parcel_documents`] and
//! [`load_day_parcels`] gather that data in a handful of batch queries.
//! Rendering the view models to paper is left to the client.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, DbResultExt};
use crate::format::{
    datetime_to_packing_time_label, format_address_from_client_details, format_boolean,
    format_breakdown_of_children, format_date, format_household_from_family_details, format_list,
    format_time,
};
use crate::models::client::Client;
use crate::models::collection_centre::CollectionCentre;
use crate::models::family::FamilyMember;
use crate::models::list_item::ListItem;
use crate::models::parcel::Parcel;

/// Upper bound on labels printed per parcel
pub const MAX_LABELS_PER_PARCEL: usize = 20;

/// Errors while gathering document data
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Some requested parcels do not exist
    #[error("Parcels not found: {0:?}")]
    MissingParcels(Vec<Uuid>),
}

/// Everything the documents need to know about one parcel
#[derive(Debug, Clone)]
pub struct ParcelDocumentData {
    pub parcel: Parcel,
    pub client: Client,
    pub family: Vec<FamilyMember>,
    pub collection_centre: Option<CollectionCentre>,
}

impl ParcelDocumentData {
    fn centre_name(&self) -> String {
        self.collection_centre
            .as_ref()
            .map(|centre| centre.name.clone())
            .unwrap_or_default()
    }

    fn centre_acronym(&self) -> String {
        self.collection_centre
            .as_ref()
            .map(|centre| centre.acronym.clone())
            .unwrap_or_default()
    }

    fn household_size(&self) -> i64 {
        self.family.len() as i64
    }
}

fn format_optional_datetime(datetime: Option<DateTime<Utc>>) -> String {
    datetime
        .map(|dt| format!("{} {}", format_date(&dt), format_time(&dt)))
        .unwrap_or_default()
}

/// Loads document data for the given parcels in request order
///
/// A parcel listed more than once yields one document, at its first position.
///
/// # Errors
///
/// [`DocumentError::MissingParcels`] if any id is unknown.
pub async fn load_parcel_documents(
    pool: &PgPool,
    parcel_ids: &[Uuid],
) -> Result<Vec<ParcelDocumentData>, DocumentError> {
    let parcels = Parcel::find_by_ids(pool, parcel_ids)
        .await
        .db_context("fetch parcels for documents")?;

    let ordered = order_by_request(parcel_ids, parcels)?;
    assemble(pool, ordered).await
}

/// Puts `parcels` in the order of `parcel_ids`, dropping repeated ids
fn order_by_request(parcel_ids: &[Uuid], parcels: Vec<Parcel>) -> Result<Vec<Parcel>, DocumentError> {
    let mut by_id: HashMap<Uuid, Parcel> = parcels.into_iter().map(|p| (p.primary_key, p)).collect();

    let mut seen = HashSet::new();
    let requested: Vec<Uuid> = parcel_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let missing: Vec<Uuid> = requested
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(DocumentError::MissingParcels(missing));
    }

    Ok(requested.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Loads document data for every parcel packed on `date`, optionally at one centre
pub async fn load_day_parcels(
    pool: &PgPool,
    date: NaiveDate,
    collection_centre: Option<Uuid>,
) -> Result<Vec<ParcelDocumentData>, DocumentError> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .map(|next| next.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let parcels = sqlx::query_as::<_, Parcel>(
        r#"
        SELECT primary_key, client_id, packing_date, packing_slot, voucher_number,
               collection_centre, collection_datetime, created_at
        FROM parcels
        WHERE packing_date >= $1 AND packing_date < $2
          AND ($3::uuid IS NULL OR collection_centre = $3)
        ORDER BY packing_date
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(collection_centre)
    .fetch_all(pool)
    .await
    .db_context("fetch parcels for day overview")?;

    assemble(pool, parcels).await
}

async fn assemble(
    pool: &PgPool,
    parcels: Vec<Parcel>,
) -> Result<Vec<ParcelDocumentData>, DocumentError> {
    let client_ids: Vec<Uuid> = parcels.iter().map(|p| p.client_id).collect();
    let clients: HashMap<Uuid, Client> = Client::find_by_ids(pool, &client_ids)
        .await
        .db_context("fetch clients for documents")?
        .into_iter()
        .map(|c| (c.primary_key, c))
        .collect();

    let family_ids: Vec<Uuid> = clients.values().map(|c| c.family_id).collect();
    let mut families: HashMap<Uuid, Vec<FamilyMember>> = HashMap::new();
    for member in FamilyMember::find_by_family_ids(pool, &family_ids)
        .await
        .db_context("fetch families for documents")?
    {
        families.entry(member.family_id).or_default().push(member);
    }

    let centres: HashMap<Uuid, CollectionCentre> = CollectionCentre::list(pool)
        .await
        .db_context("fetch collection centres")?
        .into_iter()
        .map(|c| (c.primary_key, c))
        .collect();

    // Clients cascade-delete their parcels, so every parcel has a client
    Ok(parcels
        .into_iter()
        .filter_map(|parcel| {
            let client = clients.get(&parcel.client_id)?.clone();
            let family = families.get(&client.family_id).cloned().unwrap_or_default();
            let collection_centre = parcel
                .collection_centre
                .and_then(|id| centres.get(&id).cloned());

            Some(ParcelDocumentData {
                parcel,
                client,
                family,
                collection_centre,
            })
        })
        .collect())
}

// Shopping list

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListHeader {
    pub postcode: String,
    pub voucher_number: String,
    pub packing_date: String,
    pub packing_time_label: String,
    pub collection_centre: String,
    pub collection_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListClient {
    pub full_name: String,
    pub address: String,
    pub delivery_instructions: String,
    pub phone_number: String,
    pub extra_information: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseholdSummary {
    pub household: String,
    pub children: String,
    pub baby_food: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementSummary {
    pub dietary_requirements: String,
    pub feminine_products: String,
    pub pet_food: String,
    pub other_items: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListRow {
    pub item_name: String,
    pub quantity: String,
    pub notes: String,
}

/// Shopping list for one parcel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingList {
    pub parcel_id: Uuid,
    pub header: ShoppingListHeader,
    pub client: ShoppingListClient,
    pub household: HouseholdSummary,
    pub requirements: RequirementSummary,
    pub items: Vec<ShoppingListRow>,
    pub footer: String,
}

/// Builds a shopping list, picking each item's quantity for the household size
pub fn build_shopping_list(data: &ParcelDocumentData, items: &[ListItem], footer: &str) -> ShoppingList {
    let client = &data.client;
    let parcel = &data.parcel;
    let size = data.household_size();

    ShoppingList {
        parcel_id: parcel.primary_key,
        header: ShoppingListHeader {
            postcode: client.address_postcode.clone(),
            voucher_number: parcel.voucher_number.clone().unwrap_or_default(),
            packing_date: format_date(&parcel.packing_date),
            packing_time_label: datetime_to_packing_time_label(&parcel.packing_date.to_rfc3339())
                .unwrap_or_default()
                .to_string(),
            collection_centre: data.centre_name(),
            collection_date: format_optional_datetime(parcel.collection_datetime),
        },
        client: ShoppingListClient {
            full_name: client.full_name.clone(),
            address: format_address_from_client_details(client),
            delivery_instructions: client.delivery_instructions.clone(),
            phone_number: client.phone_number.clone(),
            extra_information: client.extra_information.clone(),
        },
        household: HouseholdSummary {
            household: format_household_from_family_details(&data.family),
            children: format_breakdown_of_children(&data.family),
            baby_food: format_boolean(client.baby_food).to_string(),
        },
        requirements: RequirementSummary {
            dietary_requirements: format_list(&client.dietary_requirements),
            feminine_products: format_list(&client.feminine_products),
            pet_food: format_list(&client.pet_food),
            other_items: format_list(&client.other_items),
        },
        items: items
            .iter()
            .map(|item| ShoppingListRow {
                item_name: item.item_name.clone(),
                quantity: item.quantity_for(size).to_string(),
                notes: item.notes_for(size).unwrap_or_default().to_string(),
            })
            .collect(),
        footer: footer.to_string(),
    }
}

// Shipping labels

/// One printed label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingLabel {
    pub parcel_id: Uuid,

    /// "i/n" position of this label among the parcel's labels
    pub label: String,

    pub full_name: String,
    pub address: String,
    pub delivery_instructions: String,
    pub collection_centre: String,
    pub packing_date: String,
    pub packing_slot: String,
    pub voucher_number: String,
}

/// Builds `label_count` labels for each parcel, numbered "1/n".."n/n"
///
/// The count is clamped to `1..=MAX_LABELS_PER_PARCEL`.
pub fn build_shipping_labels(parcels: &[ParcelDocumentData], label_count: usize) -> Vec<ShippingLabel> {
    let count = label_count.clamp(1, MAX_LABELS_PER_PARCEL);

    parcels
        .iter()
        .flat_map(|data| {
            (1..=count).map(move |index| ShippingLabel {
                parcel_id: data.parcel.primary_key,
                label: format!("{}/{}", index, count),
                full_name: data.client.full_name.clone(),
                address: format_address_from_client_details(&data.client),
                delivery_instructions: data.client.delivery_instructions.clone(),
                collection_centre: data.centre_acronym(),
                packing_date: format_date(&data.parcel.packing_date),
                packing_slot: data.parcel.packing_slot.clone().unwrap_or_default(),
                voucher_number: data.parcel.voucher_number.clone().unwrap_or_default(),
            })
        })
        .collect()
}

// Driver overview

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverOverviewRow {
    pub parcel_id: Uuid,
    pub full_name: String,
    pub address: String,
    pub phone_number: String,
    pub delivery_instructions: String,
    pub baby_food: String,
    pub pet_food: String,
}

/// Run sheet handed to a delivery driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverOverview {
    pub driver_name: String,
    pub date: String,
    pub message: String,
    pub rows: Vec<DriverOverviewRow>,
}

pub fn build_driver_overview(
    driver_name: &str,
    date: NaiveDate,
    message: &str,
    parcels: &[ParcelDocumentData],
) -> DriverOverview {
    DriverOverview {
        driver_name: driver_name.trim().to_string(),
        date: date.format("%d/%m/%Y").to_string(),
        message: message.to_string(),
        rows: parcels
            .iter()
            .map(|data| DriverOverviewRow {
                parcel_id: data.parcel.primary_key,
                full_name: data.client.full_name.clone(),
                address: format_address_from_client_details(&data.client),
                phone_number: data.client.phone_number.clone(),
                delivery_instructions: data.client.delivery_instructions.clone(),
                baby_food: format_boolean(data.client.baby_food).to_string(),
                pet_food: format_list(&data.client.pet_food),
            })
            .collect(),
    }
}

// Day overview

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOverviewRow {
    pub parcel_id: Uuid,
    pub full_name: String,
    pub postcode: String,
    pub packing_slot: String,
    pub collection_centre: String,
    pub voucher_number: String,
    pub flagged_for_attention: bool,
    pub delivery_instructions: String,
}

/// All parcels packed on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOverview {
    pub date: String,
    pub collection_centre: Option<String>,
    pub rows: Vec<DayOverviewRow>,
}

/// Builds the day overview; rows are sorted by packing slot, then name
pub fn build_day_overview(
    date: NaiveDate,
    collection_centre: Option<&CollectionCentre>,
    parcels: &[ParcelDocumentData],
) -> DayOverview {
    let mut rows: Vec<DayOverviewRow> = parcels
        .iter()
        .map(|data| DayOverviewRow {
            parcel_id: data.parcel.primary_key,
            full_name: data.client.full_name.clone(),
            postcode: data.client.address_postcode.clone(),
            packing_slot: data.parcel.packing_slot.clone().unwrap_or_default(),
            collection_centre: data.centre_acronym(),
            voucher_number: data.parcel.voucher_number.clone().unwrap_or_default(),
            flagged_for_attention: data.client.flagged_for_attention,
            delivery_instructions: data.client.delivery_instructions.clone(),
        })
        .collect();

    rows.sort_by(|a, b| {
        a.packing_slot
            .cmp(&b.packing_slot)
            .then_with(|| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()))
    });

    DayOverview {
        date: date.format("%d/%m/%Y").to_string(),
        collection_centre: collection_centre.map(|centre| centre.name.clone()),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::family::Gender;
    use chrono::TimeZone;

    fn document(name: &str, slot: Option<&str>, members: usize) -> ParcelDocumentData {
        let family_id = Uuid::new_v4();
        let client = Client {
            primary_key: Uuid::new_v4(),
            full_name: name.to_string(),
            address_1: "1 Kennington Lane".to_string(),
            address_postcode: "SE11 5QY".to_string(),
            family_id,
            baby_food: Some(true),
            pet_food: vec!["Cat".to_string()],
            ..Client::default()
        };
        let family = (0..members)
            .map(|i| FamilyMember {
                primary_key: Uuid::new_v4(),
                family_id,
                gender: Gender::Female,
                age: if i == 0 { None } else { Some(4) },
            })
            .collect();
        let packing_date = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        ParcelDocumentData {
            parcel: Parcel {
                primary_key: Uuid::new_v4(),
                client_id: client.primary_key,
                packing_date,
                packing_slot: slot.map(str::to_string),
                voucher_number: Some("V-100".to_string()),
                collection_centre: None,
                collection_datetime: Some(Utc.with_ymd_and_hms(2024, 3, 2, 13, 30, 0).unwrap()),
                created_at: packing_date,
            },
            client,
            family,
            collection_centre: Some(CollectionCentre {
                primary_key: Uuid::new_v4(),
                name: "Vauxhall Hope Church".to_string(),
                acronym: "VHC".to_string(),
            }),
        }
    }

    fn list_item(name: &str) -> ListItem {
        ListItem {
            primary_key: Uuid::new_v4(),
            item_name: name.to_string(),
            row_order: 0,
            quantity_for_1: "1".to_string(),
            quantity_for_2: "2".to_string(),
            quantity_for_3: "3".to_string(),
            quantity_for_4: "4".to_string(),
            quantity_for_5: "5".to_string(),
            quantity_for_6: "6".to_string(),
            quantity_for_7: "7".to_string(),
            quantity_for_8: "8".to_string(),
            quantity_for_9: "9".to_string(),
            quantity_for_10: "10".to_string(),
            notes_for_1: None,
            notes_for_2: Some("small tins".to_string()),
            notes_for_3: None,
            notes_for_4: None,
            notes_for_5: None,
            notes_for_6: None,
            notes_for_7: None,
            notes_for_8: None,
            notes_for_9: None,
            notes_for_10: None,
        }
    }

    #[test]
    fn test_order_by_request_dedups_and_reports_missing() {
        let a = document("Ada", Some("AM"), 1).parcel;
        let b = document("Bob", Some("PM"), 1).parcel;
        let (a_id, b_id) = (a.primary_key, b.primary_key);

        let ordered = order_by_request(&[b_id, a_id, b_id], vec![a.clone(), b.clone()]).unwrap();
        let ids: Vec<Uuid> = ordered.iter().map(|p| p.primary_key).collect();
        assert_eq!(ids, vec![b_id, a_id]);

        let unknown = Uuid::new_v4();
        match order_by_request(&[a_id, unknown, unknown], vec![a, b]) {
            Err(DocumentError::MissingParcels(missing)) => assert_eq!(missing, vec![unknown]),
            other => panic!("Expected MissingParcels, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_shopping_list_uses_household_size() {
        let data = document("Ada Lovelace", Some("AM"), 2);
        let list = build_shopping_list(&data, &[list_item("Beans")], "Thank you");

        assert_eq!(list.header.packing_date, "01/03/2024");
        assert_eq!(list.header.packing_time_label, "AM");
        assert_eq!(list.header.collection_date, "02/03/2024 13:30");
        assert_eq!(list.header.collection_centre, "Vauxhall Hope Church");
        assert_eq!(list.household.household, "Family of 2 (1 adult, 1 child)");
        assert_eq!(list.household.baby_food, "Yes");
        assert_eq!(list.requirements.pet_food, "Cat");
        assert_eq!(list.requirements.dietary_requirements, "None");
        assert_eq!(list.items[0].quantity, "2");
        assert_eq!(list.items[0].notes, "small tins");
        assert_eq!(list.footer, "Thank you");
    }

    #[test]
    fn test_shopping_list_caps_large_households() {
        let data = document("Big Household", None, 13);
        let list = build_shopping_list(&data, &[list_item("Rice")], "");
        assert_eq!(list.items[0].quantity, "10");
    }

    #[test]
    fn test_shipping_labels_are_numbered() {
        let parcels = vec![document("A", None, 1), document("B", None, 1)];
        let labels = build_shipping_labels(&parcels, 3);

        assert_eq!(labels.len(), 6);
        let first: Vec<&str> = labels[..3].iter().map(|l| l.label.as_str()).collect();
        assert_eq!(first, vec!["1/3", "2/3", "3/3"]);
        assert_eq!(labels[3].full_name, "B");
        assert_eq!(labels[0].collection_centre, "VHC");

        assert_eq!(build_shipping_labels(&parcels[..1], 0).len(), 1);
    }

    #[test]
    fn test_driver_overview() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let overview = build_driver_overview(" Sam ", date, "Call ahead", &[document("Ada", None, 1)]);

        assert_eq!(overview.driver_name, "Sam");
        assert_eq!(overview.date, "01/03/2024");
        assert_eq!(overview.rows[0].address, "1 Kennington Lane, SE11 5QY");
        assert_eq!(overview.rows[0].pet_food, "Cat");
    }

    #[test]
    fn test_day_overview_sorted_by_slot_then_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let parcels = vec![
            document("zoe", Some("PM"), 1),
            document("Bob", Some("AM"), 1),
            document("alice", Some("PM"), 1),
        ];
        let overview = build_day_overview(date, None, &parcels);

        let names: Vec<&str> = overview.rows.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "alice", "zoe"]);
        assert!(overview.collection_centre.is_none());
    }
}
