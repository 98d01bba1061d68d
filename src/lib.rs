//! SatyaScan — product authenticity scanning API.
//!
//! A browser client uploads a product photo; the analysis adapter (a local
//! classifier subprocess or a hosted vision API) returns an authenticity
//! verdict, and scan records are persisted to PostgreSQL for history,
//! filtering, and dashboard analytics.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
