//! Pure formatting helpers
//!
//! String shaping used by the parcel table, client pages and PDF documents.
//! Every function here is total: missing or empty input produces a
//! documented fallback rather than an error.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike};

use crate::models::client::Client;
use crate::models::family::{FamilyMember, Gender};

/// Fallback when no address field is filled in
pub const NO_ADDRESS: &str = "No Address";

/// Fallback when a household has no children
pub const NO_CHILDREN: &str = "No Children";

/// Fallback for empty lists
pub const NONE_LISTED: &str = "None";

/// Members at or above this age count as adults
pub const ADULT_AGE: i32 = 16;

/// Household sizes at or above this collapse into the "10+" category
pub const MAX_FAMILY_CATEGORY: i64 = 10;

/// Maps a household size to its category label
///
/// ```
/// use foodbank_shared::format::family_count_to_family_category;
///
/// assert_eq!(family_count_to_family_category(1), "Single");
/// assert_eq!(family_count_to_family_category(4), "Family of 4");
/// assert_eq!(family_count_to_family_category(12), "Family of 10+");
/// ```
pub fn family_count_to_family_category(count: i64) -> String {
    if count <= 1 {
        "Single".to_string()
    } else if count < MAX_FAMILY_CATEGORY {
        format!("Family of {}", count)
    } else {
        format!("Family of {}+", MAX_FAMILY_CATEGORY)
    }
}

/// Inverse of [`family_count_to_family_category`] for filter values
///
/// Returns the inclusive range of household sizes a category covers, with
/// `None` as the upper bound for the open-ended "10+" category.
pub fn family_category_to_count_range(category: &str) -> Option<(i64, Option<i64>)> {
    if category == "Single" {
        return Some((0, Some(1)));
    }

    let rest = category.strip_prefix("Family of ")?;
    if let Some(open) = rest.strip_suffix('+') {
        let lower: i64 = open.parse().ok()?;
        return Some((lower, None));
    }

    let exact: i64 = rest.parse().ok()?;
    Some((exact, Some(exact)))
}

/// Parses the datetime formats accepted from forms and the database
pub fn parse_datetime(datetime: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = datetime.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed);
    }

    // Naive timestamps are read as-is, in a zero offset
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Labels a packing datetime as a morning or afternoon slot
///
/// Returns "AM" when the hour (in the timestamp's own offset) is 11 or
/// earlier, "PM" otherwise, and `None` when the input cannot be parsed.
pub fn datetime_to_packing_time_label(datetime: &str) -> Option<&'static str> {
    let parsed = parse_datetime(datetime)?;
    Some(if parsed.hour() <= 11 { "AM" } else { "PM" })
}

/// Formats a datetime as "DD/MM/YYYY"
pub fn format_date<Tz: chrono::TimeZone>(datetime: &DateTime<Tz>) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        datetime.day(),
        datetime.month(),
        datetime.year()
    )
}

/// Formats a datetime as "HH:MM"
pub fn format_time<Tz: chrono::TimeZone>(datetime: &DateTime<Tz>) -> String {
    format!("{:02}:{:02}", datetime.hour(), datetime.minute())
}

/// Joins the client's non-empty address lines with ", "
pub fn format_address_from_client_details(client: &Client) -> String {
    join_non_empty(
        [
            client.address_1.as_str(),
            client.address_2.as_str(),
            client.address_town.as_str(),
            client.address_county.as_str(),
            client.address_postcode.as_str(),
        ],
        NO_ADDRESS,
    )
}

/// Joins non-empty list entries with ", ", falling back to "None"
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    join_non_empty(items.iter().map(|s| s.as_ref()), NONE_LISTED)
}

/// Renders a nullable boolean answer from the intake form
pub fn format_boolean(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "Don't Know",
    }
}

fn is_adult(member: &FamilyMember) -> bool {
    member.age.map_or(true, |age| age >= ADULT_AGE)
}

fn pluralise(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Summarises a household, e.g. "Family of 3 (2 adults, 1 child)"
pub fn format_household_from_family_details(family: &[FamilyMember]) -> String {
    let adults = family.iter().filter(|m| is_adult(m)).count();
    let children = family.len() - adults;

    format!(
        "{} ({}, {})",
        family_count_to_family_category(family.len() as i64),
        pluralise(adults, "adult", "adults"),
        pluralise(children, "child", "children"),
    )
}

/// Lists each child as "<age>-year-old <gender>"
pub fn format_breakdown_of_children(family: &[FamilyMember]) -> String {
    let children: Vec<String> = family
        .iter()
        .filter(|m| !is_adult(m))
        .filter_map(|m| {
            m.age
                .map(|age| format!("{}-year-old {}", age, gender_noun(m.gender)))
        })
        .collect();

    join_non_empty(children.iter().map(String::as_str), NO_CHILDREN)
}

fn gender_noun(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "child",
    }
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>, fallback: &str) -> String {
    let joined = parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn member(age: Option<i32>, gender: Gender) -> FamilyMember {
        FamilyMember {
            primary_key: Uuid::new_v4(),
            family_id: Uuid::nil(),
            gender,
            age,
        }
    }

    fn client_with_address(lines: [&str; 5]) -> Client {
        Client {
            address_1: lines[0].to_string(),
            address_2: lines[1].to_string(),
            address_town: lines[2].to_string(),
            address_county: lines[3].to_string(),
            address_postcode: lines[4].to_string(),
            ..Client::default()
        }
    }

    #[test]
    fn test_family_category() {
        assert_eq!(family_count_to_family_category(0), "Single");
        assert_eq!(family_count_to_family_category(1), "Single");
        assert_eq!(family_count_to_family_category(2), "Family of 2");
        assert_eq!(family_count_to_family_category(9), "Family of 9");
        assert_eq!(family_count_to_family_category(10), "Family of 10+");
        assert_eq!(family_count_to_family_category(15), "Family of 10+");
    }

    #[test]
    fn test_family_category_to_range() {
        assert_eq!(family_category_to_count_range("Single"), Some((0, Some(1))));
        assert_eq!(family_category_to_count_range("Family of 4"), Some((4, Some(4))));
        assert_eq!(family_category_to_count_range("Family of 10+"), Some((10, None)));
        assert_eq!(family_category_to_count_range("Couple"), None);
        assert_eq!(family_category_to_count_range("Family of x"), None);
    }

    #[test]
    fn test_packing_time_label() {
        assert_eq!(datetime_to_packing_time_label("2024-03-01T09:30:00Z"), Some("AM"));
        assert_eq!(datetime_to_packing_time_label("2024-03-01T11:59:59Z"), Some("AM"));
        assert_eq!(datetime_to_packing_time_label("2024-03-01T12:00:00Z"), Some("PM"));
        assert_eq!(datetime_to_packing_time_label("2024-03-01 18:00:00"), Some("PM"));
        assert_eq!(datetime_to_packing_time_label("2024-03-01T10:00:00+02:00"), Some("AM"));
        assert_eq!(datetime_to_packing_time_label("not a date"), None);
        assert_eq!(datetime_to_packing_time_label(""), None);
    }

    #[test]
    fn test_format_date_and_time() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 5, 7, 4, 0).unwrap();
        assert_eq!(format_date(&dt), "05/02/2024");
        assert_eq!(format_time(&dt), "07:04");
    }

    #[test]
    fn test_format_address() {
        let client = client_with_address(["1 High St", "", "London", " ", "SE11 5QY"]);
        assert_eq!(
            format_address_from_client_details(&client),
            "1 High St, London, SE11 5QY"
        );

        let empty = client_with_address(["", "", "", "", ""]);
        assert_eq!(format_address_from_client_details(&empty), NO_ADDRESS);
    }

    #[test]
    fn test_format_household() {
        let family = vec![
            member(None, Gender::Female),
            member(Some(40), Gender::Male),
            member(Some(5), Gender::Male),
        ];
        assert_eq!(
            format_household_from_family_details(&family),
            "Family of 3 (2 adults, 1 child)"
        );

        let single = vec![member(Some(70), Gender::Other)];
        assert_eq!(
            format_household_from_family_details(&single),
            "Single (1 adult, 0 children)"
        );
    }

    #[test]
    fn test_format_children() {
        let family = vec![
            member(None, Gender::Female),
            member(Some(5), Gender::Male),
            member(Some(3), Gender::Female),
        ];
        assert_eq!(
            format_breakdown_of_children(&family),
            "5-year-old male, 3-year-old female"
        );
        assert_eq!(format_breakdown_of_children(&family[..1]), NO_CHILDREN);
    }

    #[test]
    fn test_format_list_and_boolean() {
        assert_eq!(format_list(&["Halal", "", "Vegetarian"]), "Halal, Vegetarian");
        assert_eq!(format_list::<&str>(&[]), NONE_LISTED);
        assert_eq!(format_boolean(Some(true)), "Yes");
        assert_eq!(format_boolean(Some(false)), "No");
        assert_eq!(format_boolean(None), "Don't Know");
    }
}
