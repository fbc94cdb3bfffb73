//! # Dealership Backend Library
//!
//! Backend for a used-car dealership: a public vehicle catalog with filtered,
//! paginated listings and detail lookups, and a token-gated admin API for
//! creating and updating listings and uploading images.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: SQLite persistence, connected lazily on first use
//! - **Tokio**: async runtime
//! - **Reqwest**: object storage REST client
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration and derived runtime flags
//! - [`store`]: lazily initialized SQLite pool handle
//! - [`db`]: schema initialization and sample seeding
//! - [`repository`]: catalog queries with sample-data fallback, writes
//! - [`validation`]: filter and vehicle input schemas
//! - [`slug`]: listing slugs
//! - [`query`]: query-string state for filters and pagination links
//! - [`contact`]: WhatsApp contact links
//! - [`storage`]: object storage seam and upload path rules
//! - [`error`]: error type and JSON error envelope
//! - [`middleware`]: admin token check and security headers
//! - [`routes`]: HTTP endpoint handlers
//! - [`metrics`]: request counters
//!
//! ## Demo mode
//!
//! Without a reachable database every read is served from the built-in sample
//! catalog and flagged as fallback; writes are refused with `DEMO_MODE`.

pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod query;
pub mod repository;
pub mod routes;
pub mod sample_data;
pub mod slug;
pub mod state;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;
