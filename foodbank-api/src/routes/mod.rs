/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login and token refresh
/// - `clients`: Client records and their families
/// - `parcels`: Parcel CRUD, the parcel table query and its live stream
/// - `status`: Bulk status events
/// - `lists`: Shopping list rows
/// - `collection_centres`, `website_data`: Reference data
/// - `calendar`: Collection calendar
/// - `pdfs`: Printable document view models
/// - `admin`: Staff account administration

pub mod admin;
pub mod auth;
pub mod calendar;
pub mod clients;
pub mod collection_centres;
pub mod health;
pub mod lists;
pub mod parcels;
pub mod pdfs;
pub mod status;
pub mod website_data;
