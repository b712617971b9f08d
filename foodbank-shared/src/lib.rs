//! # Foodbank Shared Library
//!
//! Data model, data access and domain logic used by the foodbank API server.
//!
//! ## Module Organization
//!
//! - `models`: database rows and sqlx queries per table
//! - `db`: connection pool and migrations
//! - `auth`: password hashing, JWTs and the admin role gate
//! - `forms`: validated request payloads
//! - `parcels_query`: filter/sort/page composition for the parcel list
//! - `realtime`: table change feed and debounced refetch
//! - `pdf`: document view models
//! - `format`: pure display helpers
//! - `paging`: page windows
//! - `error`: tagged errors carrying log identifiers

pub mod auth;
pub mod db;
pub mod error;
pub mod format;
pub mod forms;
pub mod models;
pub mod paging;
pub mod parcels_query;
pub mod pdf;
pub mod realtime;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
