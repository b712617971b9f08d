//! Middleware for the API server

pub mod security;
