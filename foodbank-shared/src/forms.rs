//! Request payloads and their validation rules
//!
//! Simple field rules are declared with `validator` derives. Rules that span
//! fields or need a pattern (postcodes, household composition, role and
//! status names) live in each form's `check` method, which runs the derived
//! rules first and merges everything into one [`ValidationErrors`].

use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::format::ADULT_AGE;
use crate::models::client::ClientDetails;
use crate::models::event::ParcelStatus;
use crate::models::family::{Gender, NewFamilyMember};
use crate::models::list_item::{ListItemDetails, HOUSEHOLD_SIZES};
use crate::models::parcel::ParcelDetails;
use crate::models::profile::UserRole;

/// Largest household a single client record may describe
pub const MAX_HOUSEHOLD_SIZE: i64 = 50;

/// Minimum password length for staff accounts
pub const MIN_PASSWORD_LENGTH: u64 = 8;

fn postcode_regex() -> &'static Regex {
    static POSTCODE: OnceLock<Regex> = OnceLock::new();
    POSTCODE.get_or_init(|| {
        Regex::new(r"^(GIR ?0AA|[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2})$")
            .expect("postcode pattern compiles")
    })
}

/// Whether `postcode` is a well-formed UK postcode (case and spacing ignored)
pub fn is_valid_postcode(postcode: &str) -> bool {
    postcode_regex().is_match(&postcode.trim().to_uppercase())
}

/// Upper-cases a postcode and puts exactly one space before the inward code
///
/// ```
/// use foodbank_shared::forms::normalize_postcode;
///
/// assert_eq!(normalize_postcode(" se115qy "), "SE11 5QY");
/// assert_eq!(normalize_postcode("sw1a 1aa"), "SW1A 1AA");
/// ```
pub fn normalize_postcode(postcode: &str) -> String {
    let compact: String = postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if compact.len() <= 3 {
        return compact;
    }
    let (outward, inward) = compact.split_at(compact.len() - 3);
    format!("{} {}", outward, inward)
}

fn field_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Runs derived rules and returns the collected errors (possibly empty)
fn derived_errors<T: Validate>(form: &T) -> ValidationErrors {
    form.validate().err().unwrap_or_default()
}

/// Adults in a household, counted by gender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdultCounts {
    pub number_of_females: i32,
    pub number_of_males: i32,
    pub number_of_unknown_gender: i32,
}

impl AdultCounts {
    pub fn total(&self) -> i64 {
        self.number_of_females as i64 + self.number_of_males as i64 + self.number_of_unknown_gender as i64
    }
}

/// One child in a household
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildForm {
    pub gender: Gender,
    pub age: i32,
}

/// Client intake form
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClientForm {
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,

    #[validate(length(max = 30, message = "Phone number is too long"))]
    pub phone_number: String,

    #[validate(length(min = 1, max = 200, message = "Address line 1 is required"))]
    pub address_1: String,

    pub address_2: String,
    pub address_town: String,
    pub address_county: String,

    /// Empty for clients with no fixed address
    pub address_postcode: String,

    pub adults: AdultCounts,
    pub children: Vec<ChildForm>,

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

impl ClientForm {
    /// Validates every field, including postcode format and household counts
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = derived_errors(self);

        let postcode = self.address_postcode.trim();
        if !postcode.is_empty() && !is_valid_postcode(postcode) {
            errors.add(
                "address_postcode",
                field_error("postcode", "Please enter a valid UK postcode"),
            );
        }

        let adults = &self.adults;
        if adults.number_of_females < 0 || adults.number_of_males < 0 || adults.number_of_unknown_gender < 0 {
            errors.add(
                "adults",
                field_error("non_negative", "Number of adults cannot be negative"),
            );
        } else if adults.total() == 0 {
            errors.add(
                "adults",
                field_error("required", "At least one adult is required"),
            );
        } else if adults.total() + self.children.len() as i64 > MAX_HOUSEHOLD_SIZE {
            errors.add(
                "adults",
                field_error(
                    "range",
                    format!("A household can have at most {} members", MAX_HOUSEHOLD_SIZE),
                ),
            );
        }

        if self.children.iter().any(|child| child.age < 0 || child.age >= ADULT_AGE) {
            errors.add(
                "children",
                field_error("range", format!("Children must be aged 0 to {}", ADULT_AGE - 1)),
            );
        }

        into_result(errors)
    }

    /// Household members described by this form
    ///
    /// Adults are stored without an age.
    pub fn family_members(&self) -> Vec<NewFamilyMember> {
        let adults = [
            (Gender::Female, self.adults.number_of_females),
            (Gender::Male, self.adults.number_of_males),
            (Gender::Other, self.adults.number_of_unknown_gender),
        ];

        adults
            .into_iter()
            .flat_map(|(gender, count)| {
                std::iter::repeat(NewFamilyMember { gender, age: None }).take(count.max(0) as usize)
            })
            .chain(self.children.iter().map(|child| NewFamilyMember {
                gender: child.gender,
                age: Some(child.age),
            }))
            .collect()
    }

    /// Splits the form into the client row and its household
    pub fn into_parts(self) -> (ClientDetails, Vec<NewFamilyMember>) {
        let family = self.family_members();
        let postcode = self.address_postcode.trim();

        let details = ClientDetails {
            full_name: self.full_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            address_1: self.address_1.trim().to_string(),
            address_2: self.address_2.trim().to_string(),
            address_town: self.address_town.trim().to_string(),
            address_county: self.address_county.trim().to_string(),
            address_postcode: if postcode.is_empty() {
                String::new()
            } else {
                normalize_postcode(postcode)
            },
            delivery_instructions: self.delivery_instructions,
            dietary_requirements: self.dietary_requirements,
            feminine_products: self.feminine_products,
            baby_food: self.baby_food,
            pet_food: self.pet_food,
            other_items: self.other_items,
            extra_information: self.extra_information,
            flagged_for_attention: self.flagged_for_attention,
            signposting_call_required: self.signposting_call_required,
        };

        (details, family)
    }
}

/// Parcel scheduling form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParcelForm {
    pub client_id: Uuid,
    pub packing_date: DateTime<Utc>,

    #[validate(length(max = 20, message = "Packing slot is too long"))]
    pub packing_slot: Option<String>,

    #[validate(length(max = 50, message = "Voucher number is too long"))]
    pub voucher_number: Option<String>,

    pub collection_centre: Option<Uuid>,
    pub collection_datetime: Option<DateTime<Utc>>,
}

impl ParcelForm {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = derived_errors(self);

        if self.collection_datetime.is_some() && self.collection_centre.is_none() {
            errors.add(
                "collection_centre",
                field_error("required", "A collection time needs a collection centre"),
            );
        }

        into_result(errors)
    }

    pub fn into_details(self) -> ParcelDetails {
        fn non_empty(value: Option<String>) -> Option<String> {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        ParcelDetails {
            client_id: self.client_id,
            packing_date: self.packing_date,
            packing_slot: non_empty(self.packing_slot),
            voucher_number: non_empty(self.voucher_number),
            collection_centre: self.collection_centre,
            collection_datetime: self.collection_datetime,
        }
    }
}

/// Status change applied to a batch of parcels
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StatusUpdateForm {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 parcels"))]
    pub parcel_ids: Vec<Uuid>,

    /// Display name of the status, e.g. "Out for Delivery"
    pub event_name: String,

    #[serde(default)]
    #[validate(length(max = 500, message = "Event data is too long"))]
    pub event_data: String,
}

impl StatusUpdateForm {
    /// Validates and resolves the status name
    pub fn check(&self) -> Result<ParcelStatus, ValidationErrors> {
        let mut errors = derived_errors(self);

        let status = ParcelStatus::from_name(&self.event_name);
        if status.is_none() {
            errors.add(
                "event_name",
                field_error("status", format!("Unknown status '{}'", self.event_name)),
            );
        }

        into_result(errors)?;
        status.ok_or_else(ValidationErrors::new)
    }
}

/// Shopping list item form
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ListItemForm {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub item_name: String,

    #[validate(range(min = 0, message = "Row order cannot be negative"))]
    pub row_order: i32,

    pub quantities: [String; HOUSEHOLD_SIZES],
    pub notes: [Option<String>; HOUSEHOLD_SIZES],
}

impl ListItemForm {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        into_result(derived_errors(self))
    }

    pub fn into_details(self) -> ListItemDetails {
        ListItemDetails {
            item_name: self.item_name.trim().to_string(),
            row_order: self.row_order,
            quantities: self.quantities.map(|q| q.trim().to_string()),
            notes: self
                .notes
                .map(|n| n.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
        }
    }
}

/// Admin: create a staff account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// "admin" or "caller"
    pub role: String,
}

impl CreateUserForm {
    /// Validates and resolves the role
    pub fn check(&self) -> Result<UserRole, ValidationErrors> {
        let mut errors = derived_errors(self);
        let role = check_role(&self.role, &mut errors);
        into_result(errors)?;
        role.ok_or_else(ValidationErrors::new)
    }
}

/// Admin: change a staff account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateUserForm {
    pub user_id: Uuid,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,

    pub role: Option<String>,
}

impl UpdateUserForm {
    /// Validates and resolves the optional role
    pub fn check(&self) -> Result<Option<UserRole>, ValidationErrors> {
        let mut errors = derived_errors(self);

        let role = self
            .role
            .as_deref()
            .and_then(|role| check_role(role, &mut errors));

        if self.email.is_none() && self.password.is_none() && self.role.is_none() {
            errors.add(
                "user_id",
                field_error("empty_update", "Nothing to update"),
            );
        }

        into_result(errors)?;
        Ok(role)
    }
}

/// Admin: remove a staff account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserForm {
    pub user_id: Uuid,
}

fn check_role(role: &str, errors: &mut ValidationErrors) -> Option<UserRole> {
    let parsed = UserRole::from_str(role);
    if parsed.is_none() {
        errors.add(
            "role",
            field_error("role", "Role must be one of: admin, caller"),
        );
    }
    parsed
}
