//! Parcel list query composition
//!
//! Turns the parcel table's filter state, one sort column and a page window
//! into a single query against the `parcels_plus` view, plus a matching
//! count query. Inactive filters (`None`, or blank text) add no predicate;
//! an active checklist with nothing selected matches no rows.
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::paging::PageWindow;
//! use foodbank_shared::parcels_query::{fetch_parcels_page, LastStatusOption, ParcelsFilters, ParcelsQuery, ParcelsSort};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let filters = ParcelsFilters {
//!     full_name: Some("smith".to_string()),
//!     last_status: Some(vec![LastStatusOption::NoStatus]),
//!     ..Default::default()
//! };
//! let query = ParcelsQuery::new(filters, ParcelsSort::default(), PageWindow::new(0, 24)?)?;
//!
//! let page = fetch_parcels_page(&pool, &query).await?;
//! println!("{} of {} parcels", page.rows.len(), page.total);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::format::{datetime_to_packing_time_label, family_category_to_count_range, family_count_to_family_category};
use crate::models::collection_centre::DELIVERY_CENTRE_NAME;
use crate::models::event::ParcelStatus;
use crate::paging::{Page, PageWindow, PageWindowError, SortDirection};

/// Wire name of the "no status yet" checklist entry
pub const NO_STATUS: &str = "NoStatus";

const PARCELS_PLUS_COLUMNS: &str = "\
    parcel_id, client_id, full_name, address_postcode, phone_number, voucher_number, \
    family_count, packing_date, packing_slot, collection_centre_name, \
    collection_centre_acronym, collection_datetime, flagged_for_attention, \
    signposting_call_required, last_status_event_name, last_status_timestamp, \
    last_status_event_data";

/// One entry of the last-status checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LastStatusOption {
    /// Parcels that have no events yet
    NoStatus,
    /// Parcels whose latest event has this name
    Status(ParcelStatus),
}

impl TryFrom<String> for LastStatusOption {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == NO_STATUS {
            return Ok(LastStatusOption::NoStatus);
        }
        ParcelStatus::from_name(&value)
            .map(LastStatusOption::Status)
            .ok_or_else(|| format!("unknown status '{}'", value))
    }
}

impl From<LastStatusOption> for String {
    fn from(option: LastStatusOption) -> Self {
        match option {
            LastStatusOption::NoStatus => NO_STATUS.to_string(),
            LastStatusOption::Status(status) => status.as_str().to_string(),
        }
    }
}

/// Inclusive packing date range; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Filter state of the parcel table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelsFilters {
    pub full_name: Option<String>,
    pub address_postcode: Option<String>,
    pub phone_number: Option<String>,
    pub voucher_number: Option<String>,
    pub packing_date: Option<DateRange>,

    /// Category labels such as "Single" or "Family of 10+"
    pub family_category: Option<Vec<String>>,

    /// Collection centre acronyms
    pub collection_centre: Option<Vec<String>>,

    pub packing_slot: Option<Vec<String>>,
    pub last_status: Option<Vec<LastStatusOption>>,
}

/// Sortable columns of the parcel table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelsSortColumn {
    FullName,
    AddressPostcode,
    PhoneNumber,
    VoucherNumber,
    FamilyCategory,
    #[default]
    PackingDate,
    PackingSlot,
    CollectionCentre,
    CollectionDatetime,
    LastStatus,
}

impl ParcelsSortColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            ParcelsSortColumn::FullName => "full_name",
            ParcelsSortColumn::AddressPostcode => "address_postcode",
            ParcelsSortColumn::PhoneNumber => "phone_number",
            ParcelsSortColumn::VoucherNumber => "voucher_number",
            ParcelsSortColumn::FamilyCategory => "family_count",
            ParcelsSortColumn::PackingDate => "packing_date",
            ParcelsSortColumn::PackingSlot => "packing_slot",
            ParcelsSortColumn::CollectionCentre => "collection_centre_acronym",
            ParcelsSortColumn::CollectionDatetime => "collection_datetime",
            ParcelsSortColumn::LastStatus => "last_status_event_name",
        }
    }
}

/// Sort state: one column and a direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelsSort {
    pub column: ParcelsSortColumn,
    pub direction: SortDirection,
}

/// A complete, validated parcel list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelsQuery {
    filters: ParcelsFilters,
    sort: ParcelsSort,
    window: PageWindow,
}

impl ParcelsQuery {
    /// Builds a request, rejecting unusable page windows
    pub fn new(
        filters: ParcelsFilters,
        sort: ParcelsSort,
        window: PageWindow,
    ) -> Result<Self, PageWindowError> {
        window.validate()?;
        Ok(Self {
            filters,
            sort,
            window,
        })
    }

    pub fn filters(&self) -> &ParcelsFilters {
        &self.filters
    }

    pub fn sort(&self) -> ParcelsSort {
        self.sort
    }

    pub fn window(&self) -> PageWindow {
        self.window
    }
}

/// Row of the `parcels_plus` view
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParcelsPlusRow {
    pub parcel_id: Uuid,
    pub client_id: Uuid,
    pub full_name: String,
    pub address_postcode: String,
    pub phone_number: String,
    pub voucher_number: Option<String>,
    pub family_count: i64,
    pub packing_date: DateTime<Utc>,
    pub packing_slot: Option<String>,
    pub collection_centre_name: Option<String>,
    pub collection_centre_acronym: Option<String>,
    pub collection_datetime: Option<DateTime<Utc>>,
    pub flagged_for_attention: bool,
    pub signposting_call_required: bool,
    pub last_status_event_name: Option<String>,
    pub last_status_timestamp: Option<DateTime<Utc>>,
    pub last_status_event_data: Option<String>,
}

/// Collection centre as shown in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CentreLabel {
    pub name: String,
    pub acronym: String,
}

/// Latest status event as shown in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastStatus {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub event_data: String,
}

/// Flags rendered as icons next to the client name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowIcons {
    pub flagged_for_attention: bool,
    pub signposting_call_required: bool,
    pub is_delivery: bool,
}

/// View model for one row of the parcel table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParcelsTableRow {
    pub parcel_id: Uuid,
    pub client_id: Uuid,
    pub full_name: String,
    pub address_postcode: String,
    pub phone_number: String,
    pub voucher_number: Option<String>,
    pub family_category: String,
    pub packing_date: DateTime<Utc>,
    pub packing_time_label: Option<String>,
    pub packing_slot: Option<String>,
    pub collection_centre: Option<CentreLabel>,
    pub collection_datetime: Option<DateTime<Utc>>,
    pub last_status: Option<LastStatus>,
    pub icons: RowIcons,
}

impl From<ParcelsPlusRow> for ParcelsTableRow {
    fn from(row: ParcelsPlusRow) -> Self {
        let collection_centre = match (row.collection_centre_name, row.collection_centre_acronym) {
            (Some(name), Some(acronym)) => Some(CentreLabel { name, acronym }),
            _ => None,
        };

        let last_status = match (row.last_status_event_name, row.last_status_timestamp) {
            (Some(name), Some(timestamp)) => Some(LastStatus {
                name,
                timestamp,
                event_data: row.last_status_event_data.unwrap_or_default(),
            }),
            _ => None,
        };

        let is_delivery = collection_centre
            .as_ref()
            .map_or(false, |centre| centre.name == DELIVERY_CENTRE_NAME);

        Self {
            parcel_id: row.parcel_id,
            client_id: row.client_id,
            full_name: row.full_name,
            address_postcode: row.address_postcode,
            phone_number: row.phone_number,
            voucher_number: row.voucher_number,
            family_category: family_count_to_family_category(row.family_count),
            packing_date: row.packing_date,
            packing_time_label: datetime_to_packing_time_label(&row.packing_date.to_rfc3339())
                .map(str::to_string),
            packing_slot: row.packing_slot,
            collection_centre,
            collection_datetime: row.collection_datetime,
            last_status,
            icons: RowIcons {
                flagged_for_attention: row.flagged_for_attention,
                signposting_call_required: row.signposting_call_required,
                is_delivery,
            },
        }
    }
}

/// Appends predicates, opening the WHERE clause on the first one
struct Predicates<'q, 'b> {
    builder: &'b mut QueryBuilder<'q, Postgres>,
    started: bool,
}

impl<'q, 'b> Predicates<'q, 'b> {
    fn new(builder: &'b mut QueryBuilder<'q, Postgres>) -> Self {
        Self {
            builder,
            started: false,
        }
    }

    fn next(&mut self) -> &mut QueryBuilder<'q, Postgres> {
        self.builder.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
        &mut *self.builder
    }

    fn ilike(&mut self, column: &str, value: Option<&str>) {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        self.next()
            .push(column)
            .push(" ILIKE ")
            .push_bind(format!("%{}%", escape_like(value)));
    }

    fn any_of(&mut self, column: &str, values: Option<&[String]>) {
        let Some(values) = values else {
            return;
        };
        if values.is_empty() {
            self.next().push("FALSE");
            return;
        }
        self.next()
            .push(column)
            .push(" = ANY(")
            .push_bind(values.to_vec())
            .push(")");
    }
}

/// Escapes LIKE wildcards so user text matches literally
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &ParcelsFilters) {
    let mut predicates = Predicates::new(builder);

    predicates.ilike("full_name", filters.full_name.as_deref());
    predicates.ilike("address_postcode", filters.address_postcode.as_deref());
    predicates.ilike("phone_number", filters.phone_number.as_deref());
    predicates.ilike("voucher_number", filters.voucher_number.as_deref());

    if let Some(range) = filters.packing_date {
        if let Some(from) = range.from {
            predicates
                .next()
                .push("packing_date >= ")
                .push_bind(start_of_day(from));
        }
        if let Some(to) = range.to {
            // No upper bound on the last representable day
            if let Some(next_day) = to.checked_add_days(Days::new(1)) {
                predicates
                    .next()
                    .push("packing_date < ")
                    .push_bind(start_of_day(next_day));
            }
        }
    }

    if let Some(categories) = &filters.family_category {
        let ranges: Vec<(i64, Option<i64>)> = categories
            .iter()
            .filter_map(|category| family_category_to_count_range(category))
            .collect();

        let builder = predicates.next();
        builder.push("(FALSE");
        for (lower, upper) in ranges {
            builder.push(" OR (family_count >= ").push_bind(lower);
            if let Some(upper) = upper {
                builder.push(" AND family_count <= ").push_bind(upper);
            }
            builder.push(")");
        }
        builder.push(")");
    }

    predicates.any_of("collection_centre_acronym", filters.collection_centre.as_deref());
    predicates.any_of("packing_slot", filters.packing_slot.as_deref());

    if let Some(options) = &filters.last_status {
        let include_no_status = options.contains(&LastStatusOption::NoStatus);
        let names: Vec<String> = options
            .iter()
            .filter_map(|option| match option {
                LastStatusOption::Status(status) => Some(status.as_str().to_string()),
                LastStatusOption::NoStatus => None,
            })
            .collect();

        let builder = predicates.next();
        match (names.is_empty(), include_no_status) {
            (true, false) => {
                builder.push("FALSE");
            }
            (true, true) => {
                builder.push("last_status_event_name IS NULL");
            }
            (false, false) => {
                builder
                    .push("last_status_event_name = ANY(")
                    .push_bind(names)
                    .push(")");
            }
            (false, true) => {
                builder
                    .push("(last_status_event_name = ANY(")
                    .push_bind(names)
                    .push(") OR last_status_event_name IS NULL)");
            }
        }
    }
}

/// Builds the page query: filters, sort with primary key tie-break, window
pub fn build_page_query(query: &ParcelsQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM parcels_plus", PARCELS_PLUS_COLUMNS));
    push_filters(&mut builder, &query.filters);

    builder
        .push(" ORDER BY ")
        .push(query.sort.column.as_sql())
        .push(" ")
        .push(query.sort.direction.as_sql())
        .push(", parcel_id ASC LIMIT ")
        .push_bind(query.window.limit())
        .push(" OFFSET ")
        .push_bind(query.window.offset());

    builder
}

/// Builds the count query for the same filters
pub fn build_count_query(filters: &ParcelsFilters) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM parcels_plus");
    push_filters(&mut builder, filters);
    builder
}

/// Runs one parcel list request
///
/// # Errors
///
/// Returns the database error unchanged; callers tag it.
pub async fn fetch_parcels_page(
    pool: &PgPool,
    query: &ParcelsQuery,
) -> Result<Page<ParcelsTableRow>, sqlx::Error> {
    let total: i64 = build_count_query(&query.filters)
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let rows = build_page_query(query)
        .build_query_as::<ParcelsPlusRow>()
        .fetch_all(pool)
        .await?;

    tracing::debug!(
        rows = rows.len(),
        total,
        start = query.window.start,
        end = query.window.end,
        "Fetched parcels page"
    );

    Ok(Page {
        rows: rows.into_iter().map(ParcelsTableRow::from).collect(),
        total,
        window: query.window,
    })
}

/// Parcel ids matching the filters, in table order, for bulk actions
pub async fn fetch_matching_parcel_ids(
    pool: &PgPool,
    filters: &ParcelsFilters,
    sort: ParcelsSort,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT parcel_id FROM parcels_plus");
    push_filters(&mut builder, filters);
    builder
        .push(" ORDER BY ")
        .push(sort.column.as_sql())
        .push(" ")
        .push(sort.direction.as_sql())
        .push(", parcel_id ASC");

    builder.build_query_scalar().fetch_all(pool).await
}
