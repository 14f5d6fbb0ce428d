//! Flocktrack - farm and flock management with lineage and health alerting.
//!
//! # Overview
//!
//! Flocktrack keeps the operational records of a poultry operation: farms,
//! the flocks assigned to them, and per-flock time series for health
//! events, egg production, feed consumption, growth weighings, and housing
//! environment. On top of the records it answers two derived questions:
//!
//! - breeding ancestry, as a depth-bounded family tree walked through each
//!   flock's optional male/female parent references;
//! - health alerting, as rolling-window checks over mortality totals and
//!   disease incident counts.
//!
//! Everything persists to per-entity JSON files, one file per store.
//!
//! # Modules
//!
//! - [`model`]: Entity types and derived-value helpers
//! - [`store`]: Generic JSON-file key/value store
//! - [`repository`]: Per-entity repositories over the stores
//! - [`service`]: Cross-repository operations (membership, mortality
//!   coupling, dependent-record checks)
//! - [`api`]: HTTP API handlers and router
//! - [`error`]: Error taxonomy and HTTP mapping

pub mod api;
pub mod error;
pub mod model;
pub mod repository;
pub mod service;
pub mod store;
