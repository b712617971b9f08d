//! Database models for the foodbank
//!
//! Each module owns one table (or a close group of tables) and its CRUD
//! operations. Queries return `sqlx::Error`; callers tag them with
//! [`crate::error::DbResultExt::db_context`].
//!
//! # Models
//!
//! - `client`: client households and their intake answers
//! - `family`: household members, keyed by the client's family id
//! - `parcel`: scheduled collections and deliveries
//! - `event`: append-only parcel status history
//! - `collection_centre`: pickup sites, including the "Delivery" pseudo-centre
//! - `list_item`: shopping list items with per-household-size quantities
//! - `website_data`: named text blocks used in documents
//! - `user`, `profile`: staff accounts and their roles

pub mod client;
pub mod collection_centre;
pub mod event;
pub mod family;
pub mod list_item;
pub mod parcel;
pub mod profile;
pub mod user;
pub mod website_data;
